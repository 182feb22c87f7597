//! Error taxonomy for the sandbox layer.
//!
//! Proxy-level violations are returned synchronously to the plugin code
//! that caused them; transport-level failures are caught at the transport
//! boundary and become a logged message or an on-page error block, never a
//! propagated error.

use limelight_dom::DomError;

/// Umbrella error for the sandbox layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// A proxied operation violated the capability rules.
    #[error("proxy violation: {0}")]
    Proxy(#[from] ProxyError),

    /// A request failed at the transport boundary.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Registry-level misuse.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The secure-evaluation service rejected a snippet.
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// Host-side document misuse surfaced at the proxy boundary.
    #[error("document error: {0}")]
    Dom(#[from] DomError),
}

/// Violations raised by proxied node operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    /// Sandboxed code asked for a tag that could exfiltrate control.
    #[error("sandboxed code attempted to create a <{tag}> element")]
    ForbiddenElement { tag: String },

    /// A resource URI tried to escape the sandbox's scope.
    #[error("resource path {uri:?} contains a parent-directory segment")]
    PathTraversal { uri: String },

    /// A resource URI tried to address a foreign origin.
    #[error("resource URI {uri:?} addresses a foreign origin")]
    AbsoluteUri { uri: String },

    /// The `send` fallback was asked for an attribute outside the allow-list.
    #[error("attribute {name:?} is not in the proxy allow-list")]
    ForbiddenAttribute { name: String },
}

/// Failures at the transport boundary. Terminal and logged, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Non-success HTTP status.
    #[error("request {path:?} failed with HTTP status {status}")]
    Network { path: String, status: u16 },

    /// Response carried a content type the classifier does not know.
    #[error("request {path:?} returned unknown content type {content_type:?}")]
    UnknownContentType { path: String, content_type: String },

    /// Structured response did not parse as an envelope.
    #[error("request {path:?} returned a malformed envelope: {detail}")]
    MalformedEnvelope { path: String, detail: String },

    /// The request could not be issued at all.
    #[error("request {path:?} could not be issued: {detail}")]
    Unreachable { path: String, detail: String },
}

/// Registry-level misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The name collides with the registry's own API surface.
    #[error("sandbox name {name:?} is reserved")]
    ReservedName { name: String },

    /// The name cannot be used to scope request paths.
    #[error("sandbox name {name:?} is not addressable")]
    InvalidName { name: String },

    /// A sandbox was built without a required collaborator.
    #[error("sandbox built without a {what}")]
    MissingCollaborator { what: String },
}

/// Failures reported by the secure-evaluation service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The snippet was rejected at compile time.
    #[error("compilation rejected: {0}")]
    Compile(String),

    /// The snippet failed while executing.
    #[error("execution rejected: {0}")]
    Run(String),

    /// A declared free variable has no binding in the sandbox's globals.
    #[error("unresolved identifier {name:?}")]
    UnresolvedBinding { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = SandboxError::from(ProxyError::ForbiddenElement {
            tag: "script".to_string(),
        });
        assert!(err.to_string().contains("<script>"));

        let err = SandboxError::from(TransportError::Network {
            path: "mkdir".to_string(),
            status: 503,
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("mkdir"));
    }
}
