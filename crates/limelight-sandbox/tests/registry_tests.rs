//! Registry behavior: creation, scaffolding, first-writer-wins.

use limelight_dom::{to_html, Document};
use limelight_sandbox::harness::{SimTransport, StubEval};
use limelight_sandbox::{RegistryError, SandboxError, SandboxRegistry};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn registry(doc: &Arc<Document>) -> SandboxRegistry {
    SandboxRegistry::new(
        Arc::clone(doc),
        Arc::new(SimTransport::new()),
        Arc::new(StubEval::new()),
        Arc::new(limelight_sandbox::TracingRenderer),
    )
}

#[test]
fn creation_builds_label_and_content_scaffolding() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    let gallery = registry
        .get_or_create("gallery", &top.root(), &[("padding", "4px")])
        .unwrap();

    let containers = doc.children(doc.root());
    assert_eq!(containers.len(), 1);
    let parts = doc.children(containers[0]);
    assert_eq!(parts.len(), 2);

    let label = parts[0];
    assert_eq!(doc.attr(label, "class"), Some("sandboxlabel".to_string()));
    assert_eq!(
        doc.text(doc.children(label)[0]),
        Some("Sandbox: gallery".to_string())
    );

    let content = parts[1];
    assert_eq!(doc.attr(content, "class"), Some("sandbox".to_string()));
    assert_eq!(doc.style(content, "background"), Some("#ffc".to_string()));
    assert_eq!(doc.style(content, "padding"), Some("4px".to_string()));
    assert_eq!(gallery.root_id(), content);
}

#[test]
fn scaffolding_serializes_as_expected() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    registry
        .get_or_create("gallery", &top.root(), &[("padding", "4px")])
        .unwrap();

    let container = doc.children(doc.root())[0];
    assert_eq!(
        to_html(&doc, container),
        "<div><div class=\"sandboxlabel\">Sandbox: gallery</div>\
         <div class=\"sandbox\" style=\"background: #ffc; padding: 4px\"></div></div>"
    );
}

#[test]
fn second_creation_returns_the_original_and_ignores_arguments() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    let first = registry
        .get_or_create("gallery", &top.root(), &[("padding", "4px")])
        .unwrap();
    let second = registry
        .get_or_create("gallery", &top.root(), &[("padding", "32px")])
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        doc.style(first.root_id(), "padding"),
        Some("4px".to_string())
    );
    // One container plus the second call built nothing.
    assert_eq!(doc.children(doc.root()).len(), 1);
    assert_eq!(registry.len(), 2); // gallery + global
}

#[test]
fn reserved_names_cannot_be_created() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    for reserved in ["create", "global"] {
        let err = registry
            .get_or_create(reserved, &top.root(), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            SandboxError::Registry(RegistryError::ReservedName { .. })
        ));
    }
    assert_eq!(registry.len(), 1); // just the implicit top-level context
}

#[test]
fn unaddressable_names_are_rejected_before_any_scaffolding() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    let err = registry.get_or_create("a/b", &top.root(), &[]).unwrap_err();
    assert!(matches!(
        err,
        SandboxError::Registry(RegistryError::InvalidName { .. })
    ));
    assert_eq!(doc.children(doc.root()).len(), 0);
}

#[test]
fn root_context_is_cached_and_rooted_at_the_document() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);

    let first = registry.root_context().unwrap();
    let second = registry.root_context().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name().as_str(), "global");
    assert_eq!(first.root_id(), doc.root());
    assert!(registry.get("global").is_some());
}

#[test]
fn lookup_by_name() {
    let doc = Arc::new(Document::new());
    let registry = registry(&doc);
    let top = registry.root_context().unwrap();

    assert!(registry.get("gallery").is_none());
    let created = registry.get_or_create("gallery", &top.root(), &[]).unwrap();
    let found = registry.get("gallery").unwrap();
    assert!(Arc::ptr_eq(&created, &found));

    let mut names: Vec<_> = registry
        .names()
        .into_iter()
        .map(|n| n.as_str().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["gallery", "global"]);
}
