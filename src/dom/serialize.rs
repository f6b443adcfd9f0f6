//! Markup serialization of document subtrees.
//!
//! Shadow roots are never entered: the markup of a component host is its
//! light tree only. Use [`inner_html`] on the shadow root itself to see what a
//! component rendered.

use super::{Document, NodeId, NodeKind};

/// Elements without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serialize the children of `id`.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut buf = String::new();
    let raw = is_raw_text_parent(doc, id);
    for &child in doc.children(id) {
        write_node(doc, child, raw, &mut buf);
    }
    buf
}

/// Serialize `id` and its children.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut buf = String::new();
    let raw = doc.parent(id).is_some_and(|p| is_raw_text_parent(doc, p));
    write_node(doc, id, raw, &mut buf);
    buf
}

fn is_raw_text_parent(doc: &Document, id: NodeId) -> bool {
    matches!(doc.node_name(id), "style" | "script")
}

fn write_node(doc: &Document, id: NodeId, raw_text: bool, buf: &mut String) {
    let Some(kind) = doc.kind(id) else { return };
    match kind {
        NodeKind::Text(text) if raw_text => buf.push_str(text),
        NodeKind::Text(text) => buf.push_str(&escape_text(text)),
        NodeKind::Comment(text) => {
            buf.push_str("<!--");
            buf.push_str(text);
            buf.push_str("-->");
        }
        NodeKind::Element { tag } | NodeKind::Component { tag } => {
            buf.push('<');
            buf.push_str(tag);
            for attr in doc.attrs(id) {
                buf.push(' ');
                buf.push_str(&attr.name);
                buf.push_str("=\"");
                buf.push_str(&escape_attr(&attr.value));
                buf.push('"');
            }
            buf.push('>');

            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }

            let raw = matches!(tag.as_str(), "style" | "script");
            for &child in doc.children(id) {
                write_node(doc, child, raw, buf);
            }

            buf.push_str("</");
            buf.push_str(tag);
            buf.push('>');
        }
        NodeKind::Document | NodeKind::Fragment | NodeKind::ShadowRoot => {
            for &child in doc.children(id) {
                write_node(doc, child, false, buf);
            }
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
