//! Fragment parser - markup string to detached node tree.
//!
//! Follows HTML tokenization for the subset templates produce:
//! - Tag and attribute names are ASCII-lowercased
//! - Attribute values may be double-quoted, single-quoted, unquoted or absent;
//!   the first of duplicate attributes wins
//! - Void elements never take children; `/>` is honoured only on them
//! - `style`, `script`, `textarea` and `title` hold raw text
//! - Unmatched end tags are ignored; open elements close at end of input
//! - Leading whitespace of the fragment is dropped
//!
//! Elements whose tag satisfies `is_component` are created as component
//! hosts, so the decision "component or plain node" is made once, here.

use super::{Attr, Document, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Raw text elements whose content still decodes character references.
const ESCAPABLE_RAW_TEXT: &[&str] = &["textarea", "title"];

/// Parse `html` into a new detached fragment node.
pub fn parse_fragment(doc: &mut Document, html: &str, is_component: &dyn Fn(&str) -> bool) -> NodeId {
    let fragment = doc.create_fragment();
    let mut parser = Parser {
        doc,
        src: html,
        pos: 0,
        fragment,
        open: Vec::new(),
        is_component,
    };
    parser.run();
    fragment
}

struct Parser<'a, 'd> {
    doc: &'d mut Document,
    src: &'a str,
    pos: usize,
    fragment: NodeId,
    /// Open elements: (node, tag).
    open: Vec<(NodeId, String)>,
    is_component: &'a dyn Fn(&str) -> bool,
}

impl Parser<'_, '_> {
    fn bytes(&self) -> &[u8] {
        self.src.as_bytes()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn current_parent(&self) -> NodeId {
        self.open.last().map(|(id, _)| *id).unwrap_or(self.fragment)
    }

    fn run(&mut self) {
        while self.pos < self.src.len() {
            if self.peek(0) == Some(b'<') {
                match self.peek(1) {
                    Some(b'/') if self.peek(2).is_some_and(|b| b.is_ascii_alphabetic()) => {
                        self.end_tag()
                    }
                    Some(b'!') => self.markup_declaration(),
                    Some(b) if b.is_ascii_alphabetic() => self.start_tag(),
                    _ => self.text(1),
                }
            } else {
                self.text(0);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Text
    // -------------------------------------------------------------------------

    /// Consume text up to the next `<` after `skip` bytes.
    fn text(&mut self, skip: usize) {
        let start = self.pos;
        let end = self.src[start + skip..]
            .find('<')
            .map(|i| start + skip + i)
            .unwrap_or(self.src.len());
        self.pos = end;
        let text = decode_entities(&self.src[start..end]);
        self.push_text(&text);
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current_parent();
        if parent == self.fragment && self.doc.child_count(parent) == 0 {
            let trimmed = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
            if trimmed.is_empty() {
                return;
            }
            let node = self.doc.create_text(trimmed);
            self.doc.append_child(parent, node);
            return;
        }
        // Adjacent text merges into one node
        if let Some(&last) = self.doc.children(parent).last() {
            if let Some(super::NodeKind::Text(existing)) = self.doc.kind(last) {
                let merged = format!("{existing}{text}");
                let node = self.doc.create_text(&merged);
                self.doc.replace_child(parent, node, last);
                self.doc.release(last);
                return;
            }
        }
        let node = self.doc.create_text(text);
        self.doc.append_child(parent, node);
    }

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek(0) {
            if b.is_ascii_whitespace() || b == b'/' || b == b'>' || b == b'=' {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].to_ascii_lowercase()
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn start_tag(&mut self) {
        self.pos += 1; // '<'
        let tag = self.read_name();
        let attrs = self.attributes();

        let node = if (self.is_component)(&tag) {
            self.doc.create_component(&tag)
        } else {
            self.doc.create_element(&tag)
        };
        for attr in attrs {
            self.doc.set_attr(node, &attr.name, &attr.value);
        }
        let parent = self.current_parent();
        self.doc.append_child(parent, node);

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
            self.raw_text(node, &tag);
            return;
        }
        self.open.push((node, tag));
    }

    /// Parse attributes up to and including `>`. A trailing `/>` is consumed
    /// and otherwise ignored, as in HTML.
    fn attributes(&mut self) -> Vec<Attr> {
        let mut attrs: Vec<Attr> = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek(0) {
                None => return attrs,
                Some(b'>') => {
                    self.pos += 1;
                    return attrs;
                }
                Some(b'/') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'=') => {
                    // Stray '=' before any name
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let name = self.read_name();
            self.skip_whitespace();
            let value = if self.peek(0) == Some(b'=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()
            } else {
                String::new()
            };

            if !name.is_empty() && !attrs.iter().any(|a| a.name == name) {
                attrs.push(Attr::new(name, value));
            }
        }
    }

    fn attribute_value(&mut self) -> String {
        match self.peek(0) {
            Some(quote @ (b'"' | b'\'')) => {
                let start = self.pos + 1;
                let end = self.src[start..]
                    .find(quote as char)
                    .map(|i| start + i)
                    .unwrap_or(self.src.len());
                self.pos = (end + 1).min(self.src.len());
                decode_entities(&self.src[start..end])
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek(0) {
                    if b.is_ascii_whitespace() || b == b'>' {
                        break;
                    }
                    self.pos += 1;
                }
                decode_entities(&self.src[start..self.pos])
            }
        }
    }

    fn raw_text(&mut self, node: NodeId, tag: &str) {
        let closing = format!("</{tag}");
        let lower = self.rest().to_ascii_lowercase();
        let (content_end, resume) = match lower.find(&closing) {
            Some(i) => {
                let after = self.pos + i + closing.len();
                let close = self.src[after..]
                    .find('>')
                    .map(|j| after + j + 1)
                    .unwrap_or(self.src.len());
                (self.pos + i, close)
            }
            None => (self.src.len(), self.src.len()),
        };

        let raw = &self.src[self.pos..content_end];
        if !raw.is_empty() {
            let text = if ESCAPABLE_RAW_TEXT.contains(&tag) {
                decode_entities(raw)
            } else {
                raw.to_string()
            };
            let child = self.doc.create_text(&text);
            self.doc.append_child(node, child);
        }
        self.pos = resume;
    }

    fn end_tag(&mut self) {
        self.pos += 2; // '</'
        let tag = self.read_name();
        // Skip anything up to '>'
        match self.rest().find('>') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
        if let Some(depth) = self.open.iter().rposition(|(_, open)| *open == tag) {
            self.open.truncate(depth);
        }
    }

    /// `<!-- comment -->`, or a doctype / bogus declaration which is skipped.
    fn markup_declaration(&mut self) {
        if self.rest().starts_with("<!--") {
            let start = self.pos + 4;
            let (end, resume) = match self.src[start..].find("-->") {
                Some(i) => (start + i, start + i + 3),
                None => (self.src.len(), self.src.len()),
            };
            let comment = self.doc.create_comment(&self.src[start..end]);
            let parent = self.current_parent();
            self.doc.append_child(parent, comment);
            self.pos = resume;
            return;
        }
        match self.rest().find('>') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.src.len(),
        }
    }
}

// =============================================================================
// Character references
// =============================================================================

/// Decode the character references templates commonly carry.
///
/// Unknown or malformed references are left as written.
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            decode_entity(entity).map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeKind;

    fn parse(doc: &mut Document, html: &str) -> NodeId {
        parse_fragment(doc, html, &|tag: &str| tag.starts_with("x-"))
    }

    #[test]
    fn test_elements_and_text() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "<div class=\"a\"><span>1</span> tail</div>");
        let div = doc.children(frag)[0];

        assert_eq!(doc.node_name(div), "div");
        assert_eq!(doc.get_attr(div, "class"), Some("a"));
        assert_eq!(doc.child_count(div), 2);
        assert_eq!(doc.text_content(div), "1 tail");
    }

    #[test]
    fn test_attribute_forms() {
        let mut doc = Document::new();
        let frag = parse(
            &mut doc,
            "<input Type=text value='a b' disabled data-x=\"1\" data-x=\"2\" p:count=k1>",
        );
        let input = doc.children(frag)[0];

        assert_eq!(doc.get_attr(input, "type"), Some("text"));
        assert_eq!(doc.get_attr(input, "value"), Some("a b"));
        assert_eq!(doc.get_attr(input, "disabled"), Some(""));
        assert_eq!(doc.get_attr(input, "data-x"), Some("1"));
        assert_eq!(doc.get_attr(input, "p:count"), Some("k1"));
        assert_eq!(doc.child_count(input), 0);
    }

    #[test]
    fn test_void_and_unclosed() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "<p>a<br>b</i></p><p>c");
        assert_eq!(doc.child_count(frag), 2);
        let first = doc.children(frag)[0];
        assert_eq!(doc.child_count(first), 3);
        assert_eq!(doc.text_content(frag), "abc");
    }

    #[test]
    fn test_component_kind() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "<x-item p:label=k2></x-item><div></div>");
        let item = doc.children(frag)[0];
        assert_eq!(
            doc.kind(item),
            Some(&NodeKind::Component { tag: "x-item".into() })
        );
        assert_eq!(doc.component_tag(doc.children(frag)[1]), None);
    }

    #[test]
    fn test_raw_text_and_comments() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "<style>a > b { color: red }</STYLE><!-- note --><b>&lt;ok&gt;</b>");
        let children = doc.children(frag).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(doc.text_content(children[0]), "a > b { color: red }");
        assert_eq!(doc.kind(children[1]), Some(&NodeKind::Comment(" note ".into())));
        assert_eq!(doc.text_content(children[2]), "<ok>");
    }

    #[test]
    fn test_leading_whitespace_dropped() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "\n   <span>x</span>\n");
        let children = doc.children(frag).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.node_name(children[0]), "span");
        assert_eq!(doc.node_name(children[1]), "#text");
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let mut doc = Document::new();
        let frag = parse(&mut doc, "1 < 2 <!doctype html>");
        assert_eq!(doc.child_count(frag), 1);
        assert_eq!(doc.text_content(frag), "1 < 2 ");
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("&bogus; & done"), "&bogus; & done");
    }
}
