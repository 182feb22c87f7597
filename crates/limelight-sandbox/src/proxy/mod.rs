//! Capability-restricted node proxies.
//!
//! A [`NodeProxy`] wraps exactly one document node and is the only handle
//! plugin code ever gets on the tree. It offers child creation, bulk child
//! removal and an allow-listed attribute surface; it never exposes the
//! wrapped node, its parent, or its siblings. Every privileged path —
//! element creation, URI rewriting, handler compilation — runs through
//! this module, so holding a proxy confers nothing beyond it.

use crate::error::{ProxyError, SandboxError};
use crate::eval::HandlerSource;
use crate::sandbox::{SandboxHandle, SandboxName};
use limelight_dom::{Document, EventKind, NodeId};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt;
use std::sync::Arc;

/// Tags sandboxed code may never create.
pub const FORBIDDEN_TAGS: [&str; 2] = ["iframe", "script"];

/// Attributes the [`NodeProxy::send`] fallback passes through unchanged.
/// `src` is additionally accepted but routed through the URI rewriter.
pub const ATTRIBUTE_ALLOW_LIST: [&str; 6] = ["alt", "class", "height", "type", "value", "width"];

// Characters that must not survive into a single raw-file path segment.
const FILE_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'#')
    .add(b'%')
    .add(b'/');

/// Capability wrapper around one document node.
///
/// Proxies are created fresh on demand and never cached; several proxies
/// may wrap the same node without coordinating.
#[derive(Clone)]
pub struct NodeProxy {
    doc: Arc<Document>,
    node: NodeId,
    ctx: SandboxHandle,
}

impl fmt::Debug for NodeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeProxy")
            .field("node", &self.node)
            .field("sandbox", self.ctx.name())
            .finish_non_exhaustive()
    }
}

impl NodeProxy {
    pub(crate) fn new(doc: Arc<Document>, node: NodeId, ctx: SandboxHandle) -> Self {
        Self { doc, node, ctx }
    }

    /// The wrapped node's id. Opaque to plugin code: without a `Document`
    /// reference (which hosts never hand out) it grants nothing.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Name of the sandbox this proxy is bound to.
    #[must_use]
    pub fn context_name(&self) -> &SandboxName {
        self.ctx.name()
    }

    /// Lowercase tag name, or `None` for text nodes.
    #[must_use]
    pub fn tag(&self) -> Option<String> {
        self.doc.tag(self.node)
    }

    /// The node's `class` attribute.
    #[must_use]
    pub fn class(&self) -> Option<String> {
        self.doc.attr(self.node, "class")
    }

    /// Text content, for text nodes.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.doc.text(self.node)
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.doc.child_count(self.node)
    }

    fn wrap(&self, node: NodeId) -> NodeProxy {
        NodeProxy::new(Arc::clone(&self.doc), node, Arc::clone(&self.ctx))
    }

    /// Append a text child and return a proxy for it.
    pub fn append_text(&self, text: &str) -> Result<NodeProxy, SandboxError> {
        let child = self.doc.create_text(text);
        self.doc.append(self.node, child)?;
        Ok(self.wrap(child))
    }

    /// Append an element child and return a proxy for it.
    ///
    /// Fails with [`ProxyError::ForbiddenElement`] for tags that could
    /// exfiltrate control; the check runs before any node is created, so a
    /// rejected call leaves the child count untouched.
    pub fn append_element(&self, tag: &str) -> Result<NodeProxy, SandboxError> {
        let tag = tag.to_ascii_lowercase();
        if FORBIDDEN_TAGS.contains(&tag.as_str()) {
            return Err(ProxyError::ForbiddenElement { tag }.into());
        }
        let child = self.doc.create_element(&tag);
        self.doc.append(self.node, child)?;
        Ok(self.wrap(child))
    }

    /// Remove all children of the wrapped node. Idempotent.
    pub fn clear(&self) {
        self.doc.clear_children(self.node);
    }

    /// Append a marked `span` and issue an asynchronous translation request
    /// for `name` through the owning sandbox.
    ///
    /// The span comes back immediately, empty; its text appears once the
    /// `{"value": …}` response is driven, in no particular order relative
    /// to other outstanding requests.
    pub fn append_placeholder(&self, name: &str) -> Result<NodeProxy, SandboxError> {
        let span = self.append_element("span")?;
        span.set_class("placeholder")?;

        let doc = Arc::clone(&self.doc);
        let node = span.node;
        let sandbox = self.ctx.name().clone();
        let marker = name.to_string();
        self.ctx.enqueue(
            &format!("fill_placeholder/{name}"),
            Some(Box::new(move |body: &str| {
                fill_placeholder(&doc, node, &sandbox, &marker, body);
            })),
        );
        Ok(span)
    }

    /// Create a child container bound to a *different* sandbox.
    ///
    /// This is how a parent sandbox embeds a nested, independently
    /// addressed sandbox in its own subtree: children created through the
    /// returned proxy are attributed to `ctx`, not to this proxy's sandbox.
    pub fn chroot(&self, ctx: SandboxHandle) -> Result<NodeProxy, SandboxError> {
        let child = self.doc.create_element("div");
        self.doc.append(self.node, child)?;
        self.doc.set_style(child, "position", "relative")?;
        Ok(NodeProxy::new(Arc::clone(&self.doc), child, ctx))
    }

    /// First child satisfying `predicate`, freshly wrapped. `None` when
    /// nothing matches — never an error.
    #[must_use]
    pub fn get_child(&self, predicate: impl Fn(&NodeProxy) -> bool) -> Option<NodeProxy> {
        self.get_children(predicate).into_iter().next()
    }

    /// All children satisfying `predicate`, each in a fresh proxy.
    #[must_use]
    pub fn get_children(&self, predicate: impl Fn(&NodeProxy) -> bool) -> Vec<NodeProxy> {
        self.doc
            .children(self.node)
            .into_iter()
            .map(|node| self.wrap(node))
            .filter(|proxy| predicate(proxy))
            .collect()
    }

    fn set_plain(&self, name: &str, value: &str) -> Result<(), SandboxError> {
        self.doc.set_attr(self.node, name, value)?;
        Ok(())
    }

    pub fn set_class(&self, value: &str) -> Result<(), SandboxError> {
        self.set_plain("class", value)
    }

    pub fn set_type(&self, value: &str) -> Result<(), SandboxError> {
        self.set_plain("type", value)
    }

    pub fn set_value(&self, value: &str) -> Result<(), SandboxError> {
        self.set_plain("value", value)
    }

    pub fn set_alt(&self, value: &str) -> Result<(), SandboxError> {
        self.set_plain("alt", value)
    }

    pub fn set_height(&self, px: u32) -> Result<(), SandboxError> {
        self.set_plain("height", &px.to_string())
    }

    pub fn set_width(&self, px: u32) -> Result<(), SandboxError> {
        self.set_plain("width", &px.to_string())
    }

    /// Set an inline style on the wrapped node.
    pub fn set_style(&self, key: &str, value: &str) -> Result<(), SandboxError> {
        self.doc.set_style(self.node, key, value)?;
        Ok(())
    }

    /// Fallback mutation path for attributes addressed by name.
    ///
    /// Anything outside the allow-list is rejected; `src` goes through the
    /// URI rewriter like [`NodeProxy::set_source`].
    pub fn send(&self, attribute: &str, value: &str) -> Result<(), SandboxError> {
        if attribute == "src" {
            return self.set_source(value);
        }
        if ATTRIBUTE_ALLOW_LIST.contains(&attribute) {
            return self.set_plain(attribute, value);
        }
        Err(ProxyError::ForbiddenAttribute {
            name: attribute.to_string(),
        }
        .into())
    }

    /// Rewrite a plugin-supplied resource URI into a sandbox-scoped path
    /// and install it as the node's `src`.
    ///
    /// On rejection the node's existing `src` is left unmodified.
    pub fn set_source(&self, uri: &str) -> Result<(), SandboxError> {
        let scoped = scope_resource(self.ctx.name(), uri)?;
        self.set_plain("src", &scoped)
    }

    /// Install a handler snippet for `kind`.
    ///
    /// The snippet is compiled once, now, inside the sandbox's global
    /// scope; the installed handler is invoked with a fresh proxy as its
    /// receiver, so handler code can append children on `this` but never
    /// reach the raw node.
    pub fn on_event(&self, kind: EventKind, handler: HandlerSource) -> Result<(), SandboxError> {
        let compiled = self.ctx.compile_handler(&handler)?;
        let id = self.ctx.install_handler(compiled);
        self.doc.set_handler(self.node, kind, id)?;
        Ok(())
    }

    pub fn on_click(&self, handler: HandlerSource) -> Result<(), SandboxError> {
        self.on_event(EventKind::Click, handler)
    }

    pub fn on_error(&self, handler: HandlerSource) -> Result<(), SandboxError> {
        self.on_event(EventKind::Error, handler)
    }

    pub fn on_load(&self, handler: HandlerSource) -> Result<(), SandboxError> {
        self.on_event(EventKind::Load, handler)
    }

    pub fn on_mouse_out(&self, handler: HandlerSource) -> Result<(), SandboxError> {
        self.on_event(EventKind::MouseOut, handler)
    }

    pub fn on_mouse_over(&self, handler: HandlerSource) -> Result<(), SandboxError> {
        self.on_event(EventKind::MouseOver, handler)
    }
}

/// Rewrite a resource URI onto the owning sandbox's address space.
///
/// Any `..` occurrence is a traversal attempt; `scheme://` means a foreign
/// origin; a bare `scheme:` reference (content-addressed file names) is
/// served through the raw-file channel; everything else is a same-origin
/// static asset.
pub(crate) fn scope_resource(name: &SandboxName, uri: &str) -> Result<String, SandboxError> {
    if uri.contains("..") {
        return Err(ProxyError::PathTraversal {
            uri: uri.to_string(),
        }
        .into());
    }
    if let Some(idx) = uri.find(':') {
        if uri[idx + 1..].starts_with("//") {
            return Err(ProxyError::AbsoluteUri {
                uri: uri.to_string(),
            }
            .into());
        }
        let encoded = utf8_percent_encode(uri, FILE_SEGMENT).to_string();
        return Ok(format!("{name}/file/{encoded}"));
    }
    Ok(format!("{name}/static/{}", uri.trim_start_matches('/')))
}

pub(crate) fn fill_placeholder(
    doc: &Document,
    span: NodeId,
    sandbox: &SandboxName,
    marker: &str,
    body: &str,
) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("value").and_then(serde_json::Value::as_str) {
            Some(text) => {
                let child = doc.create_text(text);
                if doc.append(span, child).is_err() {
                    tracing::error!(sandbox = %sandbox, marker, "placeholder span is gone");
                }
            }
            None => {
                tracing::error!(sandbox = %sandbox, marker, "placeholder response has no \"value\"");
            }
        },
        Err(err) => {
            tracing::error!(sandbox = %sandbox, marker, "malformed placeholder response: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> SandboxName {
        SandboxName::new("gallery").unwrap()
    }

    #[test]
    fn static_assets_are_scoped_under_the_sandbox() {
        assert_eq!(
            scope_resource(&name(), "images/local.jpeg").unwrap(),
            "gallery/static/images/local.jpeg"
        );
        // A leading slash does not escape the scope either.
        assert_eq!(
            scope_resource(&name(), "/images/local.jpeg").unwrap(),
            "gallery/static/images/local.jpeg"
        );
    }

    #[test]
    fn scheme_references_go_through_the_file_channel() {
        assert_eq!(
            scope_resource(&name(), "urn:sha-256:abc123").unwrap(),
            "gallery/file/urn:sha-256:abc123"
        );
        assert_eq!(
            scope_resource(&name(), "cas:photos/summer").unwrap(),
            "gallery/file/cas:photos%2Fsummer"
        );
    }

    #[test]
    fn foreign_origins_are_rejected() {
        for uri in [
            "http://www.example.com/logo.png",
            "https://example.com/",
            "ftp://host/file",
        ] {
            assert!(matches!(
                scope_resource(&name(), uri).unwrap_err(),
                SandboxError::Proxy(ProxyError::AbsoluteUri { .. })
            ));
        }
    }

    #[test]
    fn parent_directory_segments_are_rejected() {
        for uri in ["../secret", "a/../b", "..", "images/..", "a..b"] {
            assert!(matches!(
                scope_resource(&name(), uri).unwrap_err(),
                SandboxError::Proxy(ProxyError::PathTraversal { .. })
            ));
        }
    }

    #[test]
    fn traversal_check_wins_over_origin_check() {
        assert!(matches!(
            scope_resource(&name(), "http://host/../x").unwrap_err(),
            SandboxError::Proxy(ProxyError::PathTraversal { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn any_uri_containing_dotdot_is_rejected(prefix in "[a-z/]{0,12}", suffix in "[a-z/]{0,12}") {
            let uri = format!("{prefix}..{suffix}");
            let rejected = matches!(
                scope_resource(&name(), &uri),
                Err(SandboxError::Proxy(ProxyError::PathTraversal { .. }))
            );
            proptest::prop_assert!(rejected, "{} was not rejected", uri);
        }
    }
}
