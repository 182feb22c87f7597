//! Error types for document-tree operations.

/// Errors raised by raw tree operations.
///
/// These indicate host-side interface misuse (e.g. setting an attribute on
/// a text node); the sandbox layer surfaces them at the proxy boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The operation requires an element node.
    #[error("node is not an element")]
    NotAnElement,

    /// The operation requires a text node.
    #[error("node is not a text node")]
    NotText,
}
