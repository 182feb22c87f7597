//! Per-sandbox request dispatch and response classification.
//!
//! Requests are queued in the owning sandbox's outbox and driven to exactly
//! one terminal outcome each: success-render, success-exec, or a logged
//! error. Paths are scoped under the sandbox name before they reach the
//! transport, so the server can enforce name-based isolation. No retry, no
//! backoff, no cancellation; a failed request never blocks later ones.

use crate::error::TransportError;
use crate::sandbox::Sandbox;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Content type whose whole body is code to execute in the sandbox.
pub const CONTENT_TYPE_JAVASCRIPT: &str = "text/javascript";

/// Content type carrying a structured [`Envelope`].
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Raw response from the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl WireResponse {
    /// A successful response with the given content type.
    #[must_use]
    pub fn ok(content_type: &str, body: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body: body.to_string(),
        }
    }

    /// A successful `text/javascript` response.
    #[must_use]
    pub fn javascript(body: &str) -> Self {
        Self::ok(CONTENT_TYPE_JAVASCRIPT, body)
    }

    /// A successful structured response wrapping an [`Envelope`].
    #[must_use]
    pub fn envelope(kind: &str, content: &str) -> Self {
        let body = serde_json::to_string(&Envelope {
            kind: kind.to_string(),
            content: content.to_string(),
        })
        .unwrap_or_default();
        Self::ok(CONTENT_TYPE_JSON, &body)
    }

    /// An empty response with the given HTTP status.
    #[must_use]
    pub fn error_status(status: u16) -> Self {
        Self {
            status,
            content_type: String::new(),
            body: String::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Structured response envelope, dispatched by its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Callback consuming the raw body of one successful response.
pub type ResponseCallback = Box<dyn FnOnce(&str) + Send>;

/// One outstanding request; discarded after a single terminal outcome.
pub(crate) struct PendingRequest {
    /// Path as the plugin issued it, used in error messages.
    pub(crate) path: String,
    /// Sandbox-scoped path handed to the transport.
    pub(crate) scoped: String,
    pub(crate) callback: Option<ResponseCallback>,
}

pub(crate) type Outbox = Mutex<VecDeque<PendingRequest>>;

/// Asynchronous request transport.
///
/// `Err` means the request could not be carried at all; HTTP-level failure
/// comes back as a [`WireResponse`] with a non-success status.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<WireResponse, TransportError>;
}

impl Sandbox {
    /// Drive every queued request to its terminal outcome.
    ///
    /// Responses are processed as they arrive; plugin code must not assume
    /// ordering between two outstanding requests.
    pub async fn drive(self: &Arc<Self>) {
        loop {
            let next = self.outbox.lock().pop_front();
            let Some(request) = next else { break };
            self.complete(request).await;
        }
    }

    async fn complete(self: &Arc<Self>, request: PendingRequest) {
        let response = match self.transport.fetch(&request.scoped).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(sandbox = %self.name, path = %request.path, "{err}");
                return;
            }
        };

        if !response.is_success() {
            let err = TransportError::Network {
                path: request.path.clone(),
                status: response.status,
            };
            tracing::error!(sandbox = %self.name, "{err}");
            return;
        }

        match request.callback {
            Some(callback) => callback(&response.body),
            None => self.classify(&request.path, &response),
        }
    }

    fn classify(self: &Arc<Self>, path: &str, response: &WireResponse) {
        match response.content_type.as_str() {
            CONTENT_TYPE_JAVASCRIPT => {
                if let Err(err) = self.exec(&response.body) {
                    tracing::error!(sandbox = %self.name, path, "response code rejected: {err}");
                }
            }
            CONTENT_TYPE_JSON => match serde_json::from_str::<Envelope>(&response.body) {
                Ok(envelope) => self.dispatch_envelope(path, &envelope),
                Err(err) => {
                    let err = TransportError::MalformedEnvelope {
                        path: path.to_string(),
                        detail: err.to_string(),
                    };
                    tracing::error!(sandbox = %self.name, "{err}");
                }
            },
            other => {
                let err = TransportError::UnknownContentType {
                    path: path.to_string(),
                    content_type: other.to_string(),
                };
                tracing::error!(sandbox = %self.name, "{err}");
            }
        }
    }

    fn dispatch_envelope(self: &Arc<Self>, path: &str, envelope: &Envelope) {
        match envelope.kind.as_str() {
            "error" => self
                .renderer
                .show_error(self.name.as_str(), &envelope.content),
            "code" => {
                if let Err(err) = self.exec(&envelope.content) {
                    tracing::error!(sandbox = %self.name, path, "envelope code rejected: {err}");
                }
            }
            other => self.renderer.show_response(other, &envelope.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_with_type_tag() {
        let envelope = Envelope {
            kind: "error".to_string(),
            content: "Permission denied".to_string(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert_eq!(serde_json::from_str::<Envelope>(&json).unwrap(), envelope);
    }

    #[test]
    fn wire_response_constructors() {
        assert!(WireResponse::ok(CONTENT_TYPE_JSON, "{}").is_success());
        assert!(WireResponse::javascript("clear").is_success());
        assert_eq!(
            WireResponse::javascript("clear").content_type,
            CONTENT_TYPE_JAVASCRIPT
        );
        assert!(!WireResponse::error_status(404).is_success());
        assert!(!WireResponse::error_status(302).is_success());

        let enveloped = WireResponse::envelope("text", "hello");
        let parsed: Envelope = serde_json::from_str(&enveloped.body).unwrap();
        assert_eq!(parsed.kind, "text");
        assert_eq!(parsed.content, "hello");
    }
}
