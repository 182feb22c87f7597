//! Event kinds and handler bindings.

use serde::{Deserialize, Serialize};

/// Event kinds a node can carry a handler for.
///
/// Mirrors the handler surface the proxy layer exposes; anything outside
/// this set cannot be bound at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Click,
    Error,
    Load,
    MouseOut,
    MouseOver,
}

/// Opaque key for an installed handler.
///
/// The document only stores the binding; the closure itself lives in the
/// installing sandbox's handler table, so a foreign sandbox holding the id
/// cannot resolve it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(pub u64);
