//! The sandbox registry: an injected service owning the name→sandbox map.
//!
//! The map is append-only and first-writer-wins: a second `get_or_create`
//! for an existing name returns the original sandbox and ignores every
//! other argument. Sandboxes live until the page does; there is no
//! teardown API.

use crate::error::SandboxError;
use crate::eval::SecureEval;
use crate::proxy::NodeProxy;
use crate::renderer::ContentRenderer;
use crate::sandbox::{SandboxBuilder, SandboxHandle, SandboxName};
use crate::transport::Transport;
use limelight_dom::Document;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns every sandbox on the page and the collaborators used to build them.
pub struct SandboxRegistry {
    doc: Arc<Document>,
    transport: Arc<dyn Transport>,
    eval: Arc<dyn SecureEval>,
    renderer: Arc<dyn ContentRenderer>,
    sandboxes: RwLock<HashMap<SandboxName, SandboxHandle>>,
}

impl SandboxRegistry {
    /// A registry for `doc`, assembling new sandboxes from the given
    /// collaborator set.
    pub fn new(
        doc: Arc<Document>,
        transport: Arc<dyn Transport>,
        eval: Arc<dyn SecureEval>,
        renderer: Arc<dyn ContentRenderer>,
    ) -> Self {
        Self {
            doc,
            transport,
            eval,
            renderer,
            sandboxes: RwLock::new(HashMap::new()),
        }
    }

    /// The implicit top-level context, rooted at the document root.
    ///
    /// Hosts hand its root proxy to `get_or_create` as the parent for
    /// top-level sandboxes. Plugins cannot reach this path: the `global`
    /// name is reserved at validation.
    pub fn root_context(&self) -> Result<SandboxHandle, SandboxError> {
        if let Some(existing) = self.sandboxes.read().get("global") {
            return Ok(Arc::clone(existing));
        }
        let sandbox = self
            .assemble(SandboxName::global(), self.doc.root())
            .build()?;
        let mut table = self.sandboxes.write();
        let entry = table
            .entry(SandboxName::global())
            .or_insert(sandbox);
        Ok(Arc::clone(entry))
    }

    /// Return the sandbox registered under `name`, or create it.
    ///
    /// Creation builds the visible scaffolding under `parent` — a
    /// container `div`, a `Sandbox: <name>` label and a styled content
    /// `div` — then re-homes the content node as the new sandbox's root so
    /// everything the plugin builds is attributed to the new name. On a
    /// hit, `parent` and `style` have no observable effect.
    pub fn get_or_create(
        &self,
        name: &str,
        parent: &NodeProxy,
        style: &[(&str, &str)],
    ) -> Result<SandboxHandle, SandboxError> {
        // Validate before the lookup: the implicit top-level context lives
        // in the same map, and a plugin must not reach it by name.
        let name = SandboxName::new(name)?;
        if let Some(existing) = self.sandboxes.read().get(name.as_str()) {
            return Ok(Arc::clone(existing));
        }

        // Scaffolding is built through the parent's proxy, so its creation
        // is attributed to the parent sandbox.
        let container = parent.append_element("div")?;
        let label = container.append_element("div")?;
        label.set_class("sandboxlabel")?;
        label.append_text(&format!("Sandbox: {name}"))?;

        let content = container.append_element("div")?;
        content.set_class("sandbox")?;
        content.set_style("background", "#ffc")?;
        for (key, value) in style {
            content.set_style(key, value)?;
        }

        let sandbox = self.assemble(name.clone(), content.node_id()).build()?;

        let mut table = self.sandboxes.write();
        let entry = table.entry(name).or_insert(sandbox);
        Ok(Arc::clone(entry))
    }

    fn assemble(&self, name: SandboxName, root: limelight_dom::NodeId) -> SandboxBuilder {
        SandboxBuilder::new(name, Arc::clone(&self.doc), root)
            .transport(Arc::clone(&self.transport))
            .eval(Arc::clone(&self.eval))
            .renderer(Arc::clone(&self.renderer))
    }

    /// The sandbox registered under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SandboxHandle> {
        self.sandboxes.read().get(name).map(Arc::clone)
    }

    /// Registered names, in no particular order.
    #[must_use]
    pub fn names(&self) -> Vec<SandboxName> {
        self.sandboxes.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sandboxes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sandboxes.read().is_empty()
    }
}
