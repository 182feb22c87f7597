//! Secure-evaluation collaborator.
//!
//! The core never evaluates plugin code itself; it hands source text to an
//! external service and binds the result into the sandbox. Handler code is
//! delivered as data ([`HandlerSource`]): the snippet plus the free
//! variables it expects the sandbox's globals to provide. Compilation
//! happens once, at install time, and yields a closure that receives the
//! *proxy* explicitly on every invocation — handler code has no path to the
//! raw node.

use crate::error::SandboxError;
use crate::proxy::NodeProxy;
use crate::sandbox::{GlobalsHandle, SandboxHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Values stored in sandbox globals and returned by script execution.
pub type Value = serde_json::Value;

/// A handler snippet delivered as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSource {
    /// Source text, in whatever language the evaluation service accepts.
    pub source: String,
    /// Free variables the snippet expects to resolve from the sandbox's
    /// globals. Resolution failures are compile-time failures.
    pub bindings: Vec<String>,
}

impl HandlerSource {
    /// A snippet with no declared free variables.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bindings: Vec::new(),
        }
    }

    /// Declare a free variable the snippet resolves from sandbox globals.
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>) -> Self {
        self.bindings.push(name.into());
        self
    }
}

/// A compiled handler: invoked with the proxy as its receiver.
pub type CompiledHandler = Arc<dyn Fn(&NodeProxy) -> Result<(), SandboxError> + Send + Sync>;

/// External secure-evaluation service.
///
/// Implementations are trusted to confine the code they run; the core only
/// routes source text here and installs the results.
pub trait SecureEval: Send + Sync {
    /// Compile a handler snippet under the sandbox's global bindings.
    fn compile(
        &self,
        handler: &HandlerSource,
        globals: &GlobalsHandle,
    ) -> Result<CompiledHandler, SandboxError>;

    /// Run a script body with the sandbox context as its only import.
    fn run(&self, source: &str, ctx: &SandboxHandle) -> Result<Value, SandboxError>;
}
