//! Interior-mutable node arena.
//!
//! All mutation goes through `&Document`; a single `RwLock` guards the
//! arena, matching the single-threaded event-driven model the sandbox
//! layer assumes (writes are short and never held across await points).
//! Arena slots are never freed: `clear_children` detaches nodes from the
//! tree but ids stay valid, so stale proxies degrade to detached-node
//! no-ops instead of dangling.

use crate::error::DomError;
use crate::event::{EventKind, HandlerId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque key for a node in one document's arena.
///
/// Useless without a reference to the owning [`Document`], which hosts
/// never hand to plugin code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct ElementData {
    tag: String,
    attrs: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    children: Vec<NodeId>,
    handlers: BTreeMap<EventKind, HandlerId>,
}

#[derive(Debug)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(data);
        id
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match self.nodes.get(id.index()) {
            Some(NodeData::Element(el)) => Ok(el),
            _ => Err(DomError::NotAnElement),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.nodes.get_mut(id.index()) {
            Some(NodeData::Element(el)) => Ok(el),
            _ => Err(DomError::NotAnElement),
        }
    }
}

/// The host document: an arena of element and text nodes.
///
/// Created once per page by the host. The root is a `body` element.
#[derive(Debug)]
pub struct Document {
    inner: RwLock<Arena>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a `body` root element.
    #[must_use]
    pub fn new() -> Self {
        let mut arena = Arena::default();
        let root = arena.push(NodeData::Element(ElementData {
            tag: "body".to_string(),
            ..ElementData::default()
        }));
        Self {
            inner: RwLock::new(arena),
            root,
        }
    }

    /// The root element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element node. Tags are stored lowercase.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.write().push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.write().push(NodeData::Text(text.to_string()))
    }

    /// Append `child` to `parent`'s child list.
    pub fn append(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.inner.write().element_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Detach all children of `parent`. Idempotent; a text node has no
    /// children, so this is a no-op there.
    pub fn clear_children(&self, parent: NodeId) {
        let mut arena = self.inner.write();
        if let Ok(el) = arena.element_mut(parent) {
            el.children.clear();
        }
    }

    /// Current children of `parent`, in tree order. Empty for text nodes.
    #[must_use]
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.inner
            .read()
            .element(parent)
            .map(|el| el.children.clone())
            .unwrap_or_default()
    }

    /// Number of children of `parent`. Zero for text nodes.
    #[must_use]
    pub fn child_count(&self, parent: NodeId) -> usize {
        self.inner
            .read()
            .element(parent)
            .map(|el| el.children.len())
            .unwrap_or(0)
    }

    /// Lowercase tag name, or `None` for text nodes.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.inner
            .read()
            .element(node)
            .map(|el| el.tag.clone())
            .ok()
    }

    /// Whether `node` is an element.
    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner.read().element(node).is_ok()
    }

    /// Text content of a text node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<String> {
        match self.inner.read().nodes.get(node.index()) {
            Some(NodeData::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Replace the content of a text node.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        match self.inner.write().nodes.get_mut(node.index()) {
            Some(NodeData::Text(slot)) => {
                *slot = text.to_string();
                Ok(())
            }
            _ => Err(DomError::NotText),
        }
    }

    /// Attribute value on an element.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .read()
            .element(node)
            .ok()
            .and_then(|el| el.attrs.get(name).cloned())
    }

    /// Set an attribute on an element.
    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.inner
            .write()
            .element_mut(node)?
            .attrs
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// All attributes on an element, in sorted order.
    #[must_use]
    pub fn attrs(&self, node: NodeId) -> Vec<(String, String)> {
        self.inner
            .read()
            .element(node)
            .map(|el| {
                el.attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Inline style value on an element.
    #[must_use]
    pub fn style(&self, node: NodeId, key: &str) -> Option<String> {
        self.inner
            .read()
            .element(node)
            .ok()
            .and_then(|el| el.styles.get(key).cloned())
    }

    /// Set an inline style on an element.
    pub fn set_style(&self, node: NodeId, key: &str, value: &str) -> Result<(), DomError> {
        self.inner
            .write()
            .element_mut(node)?
            .styles
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// All inline styles on an element, in sorted order.
    #[must_use]
    pub fn styles(&self, node: NodeId) -> Vec<(String, String)> {
        self.inner
            .read()
            .element(node)
            .map(|el| {
                el.styles
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bind an installed handler to an event kind on an element.
    pub fn set_handler(
        &self,
        node: NodeId,
        kind: EventKind,
        handler: HandlerId,
    ) -> Result<(), DomError> {
        self.inner
            .write()
            .element_mut(node)?
            .handlers
            .insert(kind, handler);
        Ok(())
    }

    /// The handler bound to an event kind on an element, if any.
    #[must_use]
    pub fn handler(&self, node: NodeId, kind: EventKind) -> Option<HandlerId> {
        self.inner
            .read()
            .element(node)
            .ok()
            .and_then(|el| el.handlers.get(&kind).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_body_element() {
        let doc = Document::new();
        assert_eq!(doc.tag(doc.root()), Some("body".to_string()));
        assert_eq!(doc.child_count(doc.root()), 0);
    }

    #[test]
    fn append_and_clear_children() {
        let doc = Document::new();
        let div = doc.create_element("DIV");
        let text = doc.create_text("hello");
        doc.append(doc.root(), div).unwrap();
        doc.append(div, text).unwrap();

        assert_eq!(doc.tag(div), Some("div".to_string()));
        assert_eq!(doc.children(div), vec![text]);

        doc.clear_children(div);
        assert_eq!(doc.child_count(div), 0);
        // Idempotent, and the detached node id stays valid.
        doc.clear_children(div);
        assert_eq!(doc.text(text), Some("hello".to_string()));
    }

    #[test]
    fn attrs_and_styles_require_elements() {
        let doc = Document::new();
        let text = doc.create_text("x");
        assert_eq!(doc.set_attr(text, "class", "c"), Err(DomError::NotAnElement));
        assert_eq!(doc.set_style(text, "color", "red"), Err(DomError::NotAnElement));

        let img = doc.create_element("img");
        doc.set_attr(img, "alt", "a picture").unwrap();
        doc.set_style(img, "color", "red").unwrap();
        assert_eq!(doc.attr(img, "alt"), Some("a picture".to_string()));
        assert_eq!(doc.style(img, "color"), Some("red".to_string()));
        assert_eq!(doc.attr(img, "src"), None);
    }

    #[test]
    fn handler_bindings() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.set_handler(button, EventKind::Click, HandlerId(7)).unwrap();
        assert_eq!(doc.handler(button, EventKind::Click), Some(HandlerId(7)));
        assert_eq!(doc.handler(button, EventKind::Load), None);

        let text = doc.create_text("x");
        assert_eq!(
            doc.set_handler(text, EventKind::Click, HandlerId(1)),
            Err(DomError::NotAnElement)
        );
    }

    #[test]
    fn set_text_rejects_elements() {
        let doc = Document::new();
        let div = doc.create_element("div");
        assert_eq!(doc.set_text(div, "nope"), Err(DomError::NotText));
    }
}
