//! In-process collaborators for tests and the demo binary.
//!
//! [`SimTransport`] serves staged responses and records every scoped path
//! it sees. [`StubEval`] stands in for the secure-evaluation service with a
//! line-oriented directive language rich enough to exercise proxies,
//! globals and request flow. [`DomRenderer`] writes classified responses
//! into dedicated blocks of the host document.

use crate::error::{EvalError, SandboxError, TransportError};
use crate::eval::{CompiledHandler, HandlerSource, SecureEval, Value};
use crate::proxy::NodeProxy;
use crate::renderer::ContentRenderer;
use crate::sandbox::{GlobalsHandle, SandboxHandle};
use crate::transport::{Transport, WireResponse};
use limelight_dom::{Document, NodeId};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Transport serving pre-staged responses keyed by scoped path.
///
/// Each staged response is consumed once, in FIFO order per path; an
/// unstaged path gets an empty 404. Every fetched path is recorded so tests
/// can assert on the exact scoped traffic a sandbox produced.
#[derive(Default)]
pub struct SimTransport {
    routes: RwLock<HashMap<String, VecDeque<WireResponse>>>,
    seen: Mutex<Vec<String>>,
}

impl SimTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a response for one future fetch of `scoped_path`.
    pub fn stage(&self, scoped_path: &str, response: WireResponse) {
        self.routes
            .write()
            .entry(scoped_path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every scoped path fetched so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl Transport for SimTransport {
    async fn fetch(&self, path: &str) -> Result<WireResponse, TransportError> {
        self.seen.lock().push(path.to_string());
        let staged = self.routes.write().get_mut(path).and_then(VecDeque::pop_front);
        Ok(staged.unwrap_or_else(|| WireResponse::error_status(404)))
    }
}

/// Stub evaluation service speaking a line-oriented directive language.
///
/// Scripts run one directive per line; blank lines and `#` comments are
/// skipped. Handler snippets accept the subset that makes sense against a
/// proxy receiver. Unknown directives fail compilation or execution, which
/// doubles as coverage for the rejected-code paths.
///
/// Script directives:
///   `log:<msg>`             log through the sandbox
///   `append-text:<text>`    append text under the sandbox root
///   `set-class:<class>`     set `class` on the sandbox root
///   `clear`                 drop all children of the sandbox root
///   `ajax:<path>`           queue a fire-and-forget request
///   `placeholder:<name>`    append a placeholder span for `name`
///   `global:<name>=<json>`  set a sandbox global
///
/// Handler directives: `log:`, `append-text:`, `set-class:`, `clear` and
/// `global:` as above, applied to the handler's receiver proxy.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubEval;

enum HandlerOp {
    Log(String),
    AppendText(String),
    SetClass(String),
    Clear,
    SetGlobal(String, Value),
}

impl StubEval {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parse_handler_line(line: &str) -> Result<HandlerOp, SandboxError> {
        if let Some(msg) = line.strip_prefix("log:") {
            Ok(HandlerOp::Log(msg.to_string()))
        } else if let Some(text) = line.strip_prefix("append-text:") {
            Ok(HandlerOp::AppendText(text.to_string()))
        } else if let Some(class) = line.strip_prefix("set-class:") {
            Ok(HandlerOp::SetClass(class.to_string()))
        } else if line == "clear" {
            Ok(HandlerOp::Clear)
        } else if let Some(rest) = line.strip_prefix("global:") {
            let (name, value) = parse_global(rest)?;
            Ok(HandlerOp::SetGlobal(name, value))
        } else {
            Err(EvalError::Compile(format!("unknown handler directive: {line}")).into())
        }
    }
}

fn directives(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn parse_global(rest: &str) -> Result<(String, Value), SandboxError> {
    let (name, json) = rest
        .split_once('=')
        .ok_or_else(|| EvalError::Compile(format!("global directive needs '=': {rest}")))?;
    let value = serde_json::from_str(json)
        .map_err(|err| EvalError::Compile(format!("bad global value for {name}: {err}")))?;
    Ok((name.to_string(), value))
}

impl SecureEval for StubEval {
    fn compile(
        &self,
        handler: &HandlerSource,
        globals: &GlobalsHandle,
    ) -> Result<CompiledHandler, SandboxError> {
        for binding in &handler.bindings {
            if !globals.contains(binding) {
                return Err(EvalError::UnresolvedBinding {
                    name: binding.clone(),
                }
                .into());
            }
        }
        let ops = directives(&handler.source)
            .map(Self::parse_handler_line)
            .collect::<Result<Vec<_>, _>>()?;
        let globals = globals.clone();
        Ok(Arc::new(move |proxy: &NodeProxy| {
            for op in &ops {
                match op {
                    HandlerOp::Log(msg) => {
                        tracing::info!(sandbox = %proxy.context_name(), "{msg}");
                    }
                    HandlerOp::AppendText(text) => {
                        proxy.append_text(text)?;
                    }
                    HandlerOp::SetClass(class) => {
                        proxy.set_class(class)?;
                    }
                    HandlerOp::Clear => proxy.clear(),
                    HandlerOp::SetGlobal(name, value) => {
                        globals.set(name.clone(), value.clone());
                    }
                }
            }
            Ok(())
        }))
    }

    fn run(&self, source: &str, ctx: &SandboxHandle) -> Result<Value, SandboxError> {
        let mut executed = 0u64;
        for line in directives(source) {
            if let Some(msg) = line.strip_prefix("log:") {
                ctx.log(msg);
            } else if let Some(text) = line.strip_prefix("append-text:") {
                ctx.root().append_text(text)?;
            } else if let Some(class) = line.strip_prefix("set-class:") {
                ctx.root().set_class(class)?;
            } else if line == "clear" {
                ctx.root().clear();
            } else if let Some(path) = line.strip_prefix("ajax:") {
                ctx.ajax(path);
            } else if let Some(name) = line.strip_prefix("placeholder:") {
                ctx.root().append_placeholder(name)?;
            } else if let Some(rest) = line.strip_prefix("global:") {
                let (name, value) = parse_global(rest)?;
                ctx.globals().set(name, value);
            } else {
                return Err(EvalError::Run(format!("unknown directive: {line}")).into());
            }
            executed += 1;
        }
        Ok(Value::from(executed))
    }
}

/// Renderer writing classified responses into blocks of the host document.
///
/// Responses become `div.response` blocks holding a `div.type` and a
/// `div.content`; errors become `div.error` blocks holding the originating
/// context in `div.ajaxContext` and the message in `div.message`; status
/// lines accumulate as `p` children of the status node. Rendering failures
/// are logged and swallowed: a broken display must not take the transport
/// loop down with it.
pub struct DomRenderer {
    doc: Arc<Document>,
    status: NodeId,
    content: NodeId,
}

impl DomRenderer {
    #[must_use]
    pub fn new(doc: Arc<Document>, status: NodeId, content: NodeId) -> Self {
        Self {
            doc,
            status,
            content,
        }
    }

    fn block(&self, class: &str, children: &[(&str, &str)]) -> Result<(), SandboxError> {
        let block = self.doc.create_element("div");
        self.doc.set_attr(block, "class", class)?;
        for (child_class, text) in children {
            let child = self.doc.create_element("div");
            self.doc.set_attr(child, "class", child_class)?;
            let body = self.doc.create_text(text);
            self.doc.append(child, body)?;
            self.doc.append(block, child)?;
        }
        self.doc.append(self.content, block)?;
        Ok(())
    }
}

impl ContentRenderer for DomRenderer {
    fn show_response(&self, kind: &str, content: &str) {
        if let Err(err) = self.block("response", &[("type", kind), ("content", content)]) {
            tracing::error!(kind, "response block lost: {err}");
        }
    }

    fn show_error(&self, context: &str, message: &str) {
        if let Err(err) = self.block("error", &[("ajaxContext", context), ("message", message)]) {
            tracing::error!(context, "error block lost: {err}");
        }
    }

    fn update_status(&self, message: &str) {
        let line = self.doc.create_element("p");
        let body = self.doc.create_text(message);
        let appended = self
            .doc
            .append(line, body)
            .and_then(|()| self.doc.append(self.status, line));
        if let Err(err) = appended {
            tracing::error!("status line lost: {err}");
        }
    }
}
