//! Host document tree for the Limelight sandbox layer.
//!
//! This crate holds the raw tree that sandboxed plugin code is *never*
//! allowed to touch directly: an interior-mutable arena of element and text
//! nodes with attributes, inline styles and per-node event-handler
//! bindings. The capability layer in `limelight-sandbox` mediates every
//! mutation; hosts keep their own `Document` reference for rendering and
//! event delivery.

pub mod error;
pub mod event;
pub mod render;
pub mod tree;

pub use error::DomError;
pub use event::{EventKind, HandlerId};
pub use render::to_html;
pub use tree::{Document, NodeId};
