//! HTML serialization for status panes, logs and demos.

use crate::tree::{Document, NodeId};

/// Serialize a subtree to an HTML string.
///
/// Attributes come out in sorted order (the arena stores them in a
/// `BTreeMap`), inline styles collapse into a single `style` attribute, and
/// text content is escaped. Unknown ids serialize to nothing.
#[must_use]
pub fn to_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    if let Some(text) = doc.text(node) {
        out.push_str(&escape(&text));
        return;
    }
    let Some(tag) = doc.tag(node) else { return };

    out.push('<');
    out.push_str(&tag);
    for (name, value) in doc.attrs(node) {
        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        out.push_str(&escape(&value));
        out.push('"');
    }
    let styles = doc.styles(node);
    if !styles.is_empty() {
        let pairs: Vec<String> = styles
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect();
        out.push_str(" style=\"");
        out.push_str(&escape(&pairs.join("; ")));
        out.push('"');
    }
    out.push('>');

    for child in doc.children(node) {
        write_node(doc, child, out);
    }

    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
