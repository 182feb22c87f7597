//! Sandboxes: named execution contexts for untrusted plugin code.
//!
//! A [`Sandbox`] bundles an origin-scoped request path, a secure-eval entry
//! point, a root [`NodeProxy`] and an isolated global-variable table. Its
//! identity and collaborator set are frozen at [`SandboxBuilder::build`];
//! the globals table is the sole mutable surface, held behind a separate
//! [`GlobalsHandle`] so the mutability is explicit in the type.

use crate::error::{RegistryError, SandboxError};
use crate::eval::{CompiledHandler, HandlerSource, SecureEval, Value};
use crate::proxy::NodeProxy;
use crate::renderer::ContentRenderer;
use crate::transport::{Outbox, PendingRequest, ResponseCallback, Transport};
use limelight_dom::{Document, EventKind, HandlerId, NodeId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Names a plugin may never claim: `create` collides with the registry's
/// API surface, `global` with the implicit top-level context.
pub const RESERVED_NAMES: [&str; 2] = ["create", "global"];

/// Shared handle to a frozen sandbox.
pub type SandboxHandle = Arc<Sandbox>;

/// A validated sandbox name, unique within a registry.
///
/// Names scope request paths (`<name>/<path>`) and resource rewrites, so
/// only `[A-Za-z0-9_-]` is addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxName(String);

impl SandboxName {
    /// Validate a plugin-chosen name.
    pub fn new(name: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(RegistryError::ReservedName { name });
        }
        let addressable = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !addressable {
            return Err(RegistryError::InvalidName { name });
        }
        Ok(Self(name))
    }

    /// The implicit top-level context. Host-only; never creatable through
    /// [`crate::registry::SandboxRegistry::get_or_create`].
    #[must_use]
    pub fn global() -> Self {
        Self("global".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for SandboxName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The explicitly-mutable global-variable table of one sandbox.
///
/// Shared by every handler compiled against that sandbox; handlers of the
/// same sandbox are not isolated from each other, different sandboxes never
/// share a table.
#[derive(Debug, Clone, Default)]
pub struct GlobalsHandle {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl GlobalsHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite a named global.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner.write().insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// One counter for every table: an id installed by one sandbox must never
// be allocated by another, or a foreign `dispatch_event` could resolve a
// colliding id to the wrong closure.
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(0);

/// Compiled handlers installed by one sandbox, keyed by id.
///
/// The document stores only the id, so a foreign sandbox that sees the
/// binding cannot resolve the closure.
#[derive(Default)]
pub(crate) struct HandlerTable {
    entries: RwLock<HashMap<HandlerId, CompiledHandler>>,
}

impl HandlerTable {
    pub(crate) fn install(&self, handler: CompiledHandler) -> HandlerId {
        let id = HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed));
        self.entries.write().insert(id, handler);
        id
    }

    pub(crate) fn get(&self, id: HandlerId) -> Option<CompiledHandler> {
        self.entries.read().get(&id).cloned()
    }
}

/// A named execution context for untrusted plugin code.
///
/// Frozen after construction; see [`SandboxBuilder`]. Plugin code receives
/// this as its whole world: name, root proxy, `ajax`, `log`, globals.
pub struct Sandbox {
    pub(crate) name: SandboxName,
    pub(crate) doc: Arc<Document>,
    pub(crate) root: NodeId,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) eval: Arc<dyn SecureEval>,
    pub(crate) renderer: Arc<dyn ContentRenderer>,
    pub(crate) globals: GlobalsHandle,
    pub(crate) handlers: HandlerTable,
    pub(crate) outbox: Outbox,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("globals", &self.globals.len())
            .field("pending", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    /// Start building a sandbox rooted at `root`.
    #[must_use]
    pub fn builder(name: SandboxName, doc: Arc<Document>, root: NodeId) -> SandboxBuilder {
        SandboxBuilder::new(name, doc, root)
    }

    #[must_use]
    pub fn name(&self) -> &SandboxName {
        &self.name
    }

    /// The root node's id, for host-side rendering and event delivery.
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// A fresh proxy for the sandbox's root container.
    ///
    /// One proxy instance per call; proxies are never cached.
    #[must_use]
    pub fn root(self: &Arc<Self>) -> NodeProxy {
        NodeProxy::new(Arc::clone(&self.doc), self.root, Arc::clone(self))
    }

    /// The sandbox's mutable global-variable table.
    #[must_use]
    pub fn globals(&self) -> &GlobalsHandle {
        &self.globals
    }

    /// Log a message attributed to this sandbox.
    pub fn log(&self, message: &str) {
        tracing::info!(sandbox = %self.name, "{message}");
        self.renderer
            .update_status(&format!("{}: {}", self.name, message));
    }

    /// Issue a fire-and-forget request; the response is classified and
    /// rendered, executed or logged when [`Sandbox::drive`] processes it.
    pub fn ajax(&self, path: &str) {
        self.enqueue(path, None);
    }

    /// Issue a request whose successful body goes to `callback` instead of
    /// the response classifier.
    pub fn ajax_with(&self, path: &str, callback: ResponseCallback) {
        self.enqueue(path, Some(callback));
    }

    pub(crate) fn enqueue(&self, path: &str, callback: Option<ResponseCallback>) {
        let request = PendingRequest {
            scoped: format!("{}/{}", self.name, path),
            path: path.to_string(),
            callback,
        };
        tracing::debug!(sandbox = %self.name, path = %request.path, "request queued");
        self.outbox.lock().push_back(request);
    }

    /// Requests queued but not yet driven to a terminal outcome.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.outbox.lock().len()
    }

    /// Execute a script body inside this sandbox's scope.
    pub fn exec(self: &Arc<Self>, source: &str) -> Result<Value, SandboxError> {
        self.eval.run(source, self)
    }

    pub(crate) fn compile_handler(
        &self,
        handler: &HandlerSource,
    ) -> Result<CompiledHandler, SandboxError> {
        self.eval.compile(handler, &self.globals)
    }

    pub(crate) fn install_handler(&self, compiled: CompiledHandler) -> HandlerId {
        self.handlers.install(compiled)
    }

    /// Fire the handler bound to `kind` on `node`, passing a fresh proxy as
    /// the receiver. `Ok(false)` when no handler of *this* sandbox is
    /// bound there — handlers installed by other sandboxes are invisible.
    pub fn dispatch_event(
        self: &Arc<Self>,
        node: NodeId,
        kind: EventKind,
    ) -> Result<bool, SandboxError> {
        let Some(id) = self.doc.handler(node, kind) else {
            return Ok(false);
        };
        let Some(handler) = self.handlers.get(id) else {
            return Ok(false);
        };
        let proxy = NodeProxy::new(Arc::clone(&self.doc), node, Arc::clone(self));
        handler(&proxy)?;
        Ok(true)
    }
}

/// Assembles a [`Sandbox`] and freezes it.
///
/// Transport and evaluator are required; the renderer defaults to
/// [`crate::renderer::TracingRenderer`]. The globals table stays mutable
/// for the sandbox's whole lifetime, everything else is fixed at `build`.
pub struct SandboxBuilder {
    name: SandboxName,
    doc: Arc<Document>,
    root: NodeId,
    transport: Option<Arc<dyn Transport>>,
    eval: Option<Arc<dyn SecureEval>>,
    renderer: Option<Arc<dyn ContentRenderer>>,
    globals: GlobalsHandle,
}

impl SandboxBuilder {
    #[must_use]
    pub fn new(name: SandboxName, doc: Arc<Document>, root: NodeId) -> Self {
        Self {
            name,
            doc,
            root,
            transport: None,
            eval: None,
            renderer: None,
            globals: GlobalsHandle::new(),
        }
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn eval(mut self, eval: Arc<dyn SecureEval>) -> Self {
        self.eval = Some(eval);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn ContentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Seed a named global before the sandbox is published.
    #[must_use]
    pub fn global(self, name: impl Into<String>, value: Value) -> Self {
        self.globals.set(name, value);
        self
    }

    /// Freeze the sandbox.
    pub fn build(self) -> Result<SandboxHandle, SandboxError> {
        let transport = self.transport.ok_or_else(|| RegistryError::MissingCollaborator {
            what: "transport".to_string(),
        })?;
        let eval = self.eval.ok_or_else(|| RegistryError::MissingCollaborator {
            what: "secure evaluator".to_string(),
        })?;
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(crate::renderer::TracingRenderer));
        Ok(Arc::new(Sandbox {
            name: self.name,
            doc: self.doc,
            root: self.root,
            transport,
            eval,
            renderer,
            globals: self.globals,
            handlers: HandlerTable::default(),
            outbox: Outbox::default(),
        }))
    }
}
