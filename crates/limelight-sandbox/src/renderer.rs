//! Content-renderer collaborator.
//!
//! Transport hands classified responses to a renderer; the core does not
//! prescribe how they are shown. The harness ships a DOM-backed renderer;
//! this module only carries the trait and a log-only default.

/// Consumer of classified responses and status lines.
pub trait ContentRenderer: Send + Sync {
    /// Render a generic content block of the given kind.
    fn show_response(&self, kind: &str, content: &str);

    /// Render an error block attributed to a context (sandbox name).
    fn show_error(&self, context: &str, message: &str);

    /// Append a line to the status pane.
    fn update_status(&self, message: &str);
}

/// Log-only renderer, the default when the host supplies nothing richer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl ContentRenderer for TracingRenderer {
    fn show_response(&self, kind: &str, content: &str) {
        tracing::info!(kind, "{content}");
    }

    fn show_error(&self, context: &str, message: &str) {
        tracing::error!(context, "{message}");
    }

    fn update_status(&self, message: &str) {
        tracing::info!("{message}");
    }
}
