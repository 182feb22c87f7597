//! Capability-mediated sandboxing for untrusted page plugins.
//!
//! The crate mediates every interaction between plugin code and the host
//! page. Plugins see the world through three narrow surfaces:
//!
//! - [`proxy::NodeProxy`] — a capability wrapper around one document node,
//!   offering child creation, an allow-listed attribute surface and
//!   sandbox-scoped resource URIs, but no raw node, parent or sibling
//!   access;
//! - [`sandbox::Sandbox`] — a named execution context bundling the proxy
//!   root with scoped requests, logging and an isolated globals table;
//! - [`registry::SandboxRegistry`] — the page-level name→sandbox map with
//!   first-writer-wins creation.
//!
//! Code evaluation and response display are injected through the
//! [`eval::SecureEval`] and [`renderer::ContentRenderer`] traits; the
//! [`harness`] module ships in-process implementations for tests and demos.

pub mod error;
pub mod eval;
pub mod harness;
pub mod proxy;
pub mod registry;
pub mod renderer;
pub mod sandbox;
pub mod transport;

pub use error::{EvalError, ProxyError, RegistryError, SandboxError, TransportError};
pub use eval::{CompiledHandler, HandlerSource, SecureEval, Value};
pub use proxy::{NodeProxy, ATTRIBUTE_ALLOW_LIST, FORBIDDEN_TAGS};
pub use registry::SandboxRegistry;
pub use renderer::{ContentRenderer, TracingRenderer};
pub use sandbox::{
    GlobalsHandle, Sandbox, SandboxBuilder, SandboxHandle, SandboxName, RESERVED_NAMES,
};
pub use transport::{Envelope, ResponseCallback, Transport, WireResponse};
