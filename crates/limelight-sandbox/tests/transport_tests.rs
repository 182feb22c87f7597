//! End-to-end request flow: scoping, classification, rendering.

use limelight_dom::{Document, NodeId};
use limelight_sandbox::harness::{DomRenderer, SimTransport, StubEval};
use limelight_sandbox::{SandboxHandle, SandboxRegistry, Transport, WireResponse};
use std::sync::{Arc, Mutex};

struct Page {
    doc: Arc<Document>,
    transport: Arc<SimTransport>,
    registry: SandboxRegistry,
    content: NodeId,
}

impl Page {
    fn new() -> Self {
        let doc = Arc::new(Document::new());
        let status = doc.create_element("div");
        let content = doc.create_element("div");
        doc.append(doc.root(), status).unwrap();
        doc.append(doc.root(), content).unwrap();

        let transport = Arc::new(SimTransport::new());
        let registry = SandboxRegistry::new(
            Arc::clone(&doc),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(StubEval::new()),
            Arc::new(DomRenderer::new(Arc::clone(&doc), status, content)),
        );
        Self {
            doc,
            transport,
            registry,
            content,
        }
    }

    fn sandbox(&self, name: &str) -> SandboxHandle {
        let top = self.registry.root_context().unwrap();
        self.registry.get_or_create(name, &top.root(), &[]).unwrap()
    }

    fn content_blocks(&self) -> Vec<(String, Vec<String>)> {
        self.doc
            .children(self.content)
            .into_iter()
            .map(|block| {
                let class = self.doc.attr(block, "class").unwrap_or_default();
                let texts = self
                    .doc
                    .children(block)
                    .into_iter()
                    .filter_map(|part| {
                        self.doc
                            .children(part)
                            .first()
                            .and_then(|text| self.doc.text(*text))
                    })
                    .collect();
                (class, texts)
            })
            .collect()
    }
}

#[tokio::test]
async fn requests_are_scoped_under_the_sandbox_name() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");

    gallery.ajax("refresh");
    gallery.drive().await;

    assert_eq!(page.transport.requests(), vec!["gallery/refresh"]);
    assert_eq!(gallery.pending_requests(), 0);
}

#[tokio::test]
async fn javascript_responses_execute_in_the_sandbox() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport.stage(
        "gallery/refresh",
        WireResponse::javascript("append-text:two new photos"),
    );

    gallery.ajax("refresh");
    gallery.drive().await;

    let children = page.doc.children(gallery.root_id());
    assert_eq!(children.len(), 1);
    assert_eq!(
        page.doc.text(children[0]),
        Some("two new photos".to_string())
    );
}

#[tokio::test]
async fn error_envelopes_render_an_error_block() {
    let page = Page::new();
    let uploader = page.sandbox("uploader");
    page.transport.stage(
        "uploader/refresh",
        WireResponse::envelope("error", "Permission denied"),
    );

    uploader.ajax("refresh");
    uploader.drive().await;

    assert_eq!(
        page.content_blocks(),
        vec![(
            "error".to_string(),
            vec!["uploader".to_string(), "Permission denied".to_string()]
        )]
    );
}

#[tokio::test]
async fn other_envelope_kinds_render_a_response_block() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport
        .stage("gallery/motd", WireResponse::envelope("text", "welcome back"));

    gallery.ajax("motd");
    gallery.drive().await;

    assert_eq!(
        page.content_blocks(),
        vec![(
            "response".to_string(),
            vec!["text".to_string(), "welcome back".to_string()]
        )]
    );
}

#[tokio::test]
async fn code_envelopes_execute_like_javascript_bodies() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport.stage(
        "gallery/setup",
        WireResponse::envelope("code", "set-class:ready"),
    );

    gallery.ajax("setup");
    gallery.drive().await;

    assert_eq!(
        page.doc.attr(gallery.root_id(), "class"),
        Some("ready".to_string())
    );
    assert!(page.content_blocks().is_empty());
}

#[tokio::test]
async fn failures_do_not_block_later_requests() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport.stage(
        "gallery/refresh",
        WireResponse::javascript("append-text:after the 404"),
    );

    gallery.ajax("missing"); // unstaged: 404, logged
    gallery.ajax("refresh");
    gallery.drive().await;

    assert_eq!(
        page.transport.requests(),
        vec!["gallery/missing", "gallery/refresh"]
    );
    assert_eq!(page.doc.children(gallery.root_id()).len(), 1);
    assert!(page.content_blocks().is_empty());
}

#[tokio::test]
async fn unknown_content_types_render_nothing() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport
        .stage("gallery/page", WireResponse::ok("text/html", "<b>hi</b>"));

    gallery.ajax("page");
    gallery.drive().await;

    assert!(page.content_blocks().is_empty());
    assert_eq!(page.doc.children(gallery.root_id()).len(), 0);
}

#[tokio::test]
async fn callbacks_consume_the_raw_body() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport
        .stage("gallery/raw", WireResponse::ok("text/html", "<b>hi</b>"));

    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    gallery.ajax_with(
        "raw",
        Box::new(move |body| {
            *sink.lock().unwrap() = Some(body.to_string());
        }),
    );
    gallery.drive().await;

    // The callback gets the body even for a type the classifier would drop.
    assert_eq!(*seen.lock().unwrap(), Some("<b>hi</b>".to_string()));
    assert!(page.content_blocks().is_empty());
}

#[tokio::test]
async fn placeholders_fill_exactly_once_when_driven() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport.stage(
        "gallery/fill_placeholder/username",
        WireResponse::ok("application/json", r#"{"value": "Alice"}"#),
    );

    let span = gallery.root().append_placeholder("username").unwrap();
    assert_eq!(span.tag(), Some("span".to_string()));
    assert_eq!(span.class(), Some("placeholder".to_string()));
    assert_eq!(span.child_count(), 0, "empty until the response arrives");

    gallery.drive().await;
    assert_eq!(span.child_count(), 1);
    assert_eq!(
        span.get_child(|_| true).and_then(|text| text.text()),
        Some("Alice".to_string())
    );

    // Driving again must not refill.
    gallery.drive().await;
    assert_eq!(span.child_count(), 1);
    assert_eq!(
        page.transport.requests(),
        vec!["gallery/fill_placeholder/username"]
    );
}

#[tokio::test]
async fn malformed_placeholder_responses_leave_the_span_empty() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");
    page.transport.stage(
        "gallery/fill_placeholder/username",
        WireResponse::ok("application/json", r#"{"wrong": "shape"}"#),
    );

    let span = gallery.root().append_placeholder("username").unwrap();
    gallery.drive().await;
    assert_eq!(span.child_count(), 0);
}

#[tokio::test]
async fn status_updates_reach_the_status_pane() {
    let page = Page::new();
    let gallery = page.sandbox("gallery");

    gallery.log("ready");

    let status = page.doc.children(page.doc.root())[0];
    let lines = page.doc.children(status);
    assert_eq!(lines.len(), 1);
    assert_eq!(
        page.doc.text(page.doc.children(lines[0])[0]),
        Some("gallery: ready".to_string())
    );
}
