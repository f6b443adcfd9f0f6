//! Diff/Patch Engine - positional reconciliation of a live subtree against a
//! freshly parsed one.
//!
//! # Algorithm
//!
//! Per parent pair `(current, next)`:
//!
//! 1. Snapshot `next`'s children; put the style node (if any) first
//! 2. Remove `current`'s surplus children from the end
//! 3. For each index `i`, with `c = current[i]` and `n = next[i]`:
//!    - no `c`: append a deep clone of `n`
//!    - different node names: replace `c` with a deep clone of `n`
//!    - `n` has children: recurse
//!    - `c` hosts a live instance: push `n`'s attributes as props and
//!      render it compare-first
//!    - different text content: replace `c` with a deep clone of `n`
//!    - if `c` stayed in place: drop all its attributes, copy `n`'s
//!
//! Children correspond by position only. A reorder is a series of
//! mismatches, never a move. `next` is only read: nodes enter the live tree
//! as clones.
//!
//! Node insertions and removals are reported to a [`PatchHost`], which runs
//! component lifecycles for hosts inside the affected subtrees.

mod events;

pub use events::bind_events;

use crate::dom::{Document, NodeId};
use crate::error::Result;

/// Lifecycle callbacks the patch engine drives.
pub trait PatchHost {
    /// `node` was inserted under the live tree.
    fn connected(&mut self, doc: &mut Document, node: NodeId) -> Result<()>;

    /// `node` was removed from the live tree. It is released afterwards.
    fn disconnected(&mut self, doc: &mut Document, node: NodeId) -> Result<()>;

    /// Push the attributes of `next` into the instance on `host` and render it
    /// compare-first. Returns whether it rendered.
    fn update_nested(&mut self, doc: &mut Document, host: NodeId, next: NodeId) -> Result<bool>;
}

/// Host for trees without components.
impl PatchHost for () {
    fn connected(&mut self, _doc: &mut Document, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn disconnected(&mut self, _doc: &mut Document, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn update_nested(&mut self, _doc: &mut Document, _host: NodeId, _next: NodeId) -> Result<bool> {
        Ok(false)
    }
}

/// What a patch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub inserted: usize,
    pub removed: usize,
    pub replaced: usize,
    /// Parent pairs descended into.
    pub recursed: usize,
    /// Nested instances that received props.
    pub nested_updates: usize,
    /// Nested instances that re-rendered after receiving props.
    pub nested_renders: usize,
}

impl PatchStats {
    /// No node entered or left the live tree.
    pub fn is_structurally_unchanged(&self) -> bool {
        self.inserted == 0 && self.removed == 0 && self.replaced == 0
    }
}

/// Reconcile the children of `current` against those of `next`.
pub fn patch(
    doc: &mut Document,
    host: &mut dyn PatchHost,
    current: NodeId,
    next: NodeId,
    style: Option<NodeId>,
) -> Result<PatchStats> {
    let mut stats = PatchStats::default();
    patch_children(doc, host, current, next, style, &mut stats)?;
    Ok(stats)
}

fn patch_children(
    doc: &mut Document,
    host: &mut dyn PatchHost,
    current: NodeId,
    next: NodeId,
    style: Option<NodeId>,
    stats: &mut PatchStats,
) -> Result<()> {
    let mut next_children = doc.children(next).to_vec();
    if let Some(style) = style {
        next_children.insert(0, style);
    }

    // Positional truncation
    while doc.child_count(current) > next_children.len() {
        let Some(last) = doc.last_child(current) else { break };
        doc.remove(last);
        stats.removed += 1;
        let detached = host.disconnected(doc, last);
        doc.release(last);
        detached?;
    }

    for (i, &n) in next_children.iter().enumerate() {
        let Some(c) = doc.children(current).get(i).copied() else {
            let clone = doc.clone_deep(n);
            doc.append_child(current, clone);
            stats.inserted += 1;
            host.connected(doc, clone)?;
            continue;
        };

        if doc.node_name(c) != doc.node_name(n) {
            replace(doc, host, current, c, n, stats)?;
            continue;
        }

        if doc.child_count(n) > 0 {
            stats.recursed += 1;
            patch_children(doc, host, c, n, None, stats)?;
        } else if doc.instance(c).is_some() {
            stats.nested_updates += 1;
            if host.update_nested(doc, c, n)? {
                stats.nested_renders += 1;
            }
        } else if doc.text_content(c) != doc.text_content(n) {
            replace(doc, host, current, c, n, stats)?;
            continue;
        }

        if doc.is_element(c) {
            let attrs = doc.attrs(n).to_vec();
            doc.clear_attrs(c);
            for attr in attrs {
                doc.set_attr(c, &attr.name, &attr.value);
            }
        }
    }
    Ok(())
}

fn replace(
    doc: &mut Document,
    host: &mut dyn PatchHost,
    parent: NodeId,
    old: NodeId,
    template: NodeId,
    stats: &mut PatchStats,
) -> Result<()> {
    let clone = doc.clone_deep(template);
    doc.replace_child(parent, clone, old);
    stats.replaced += 1;

    let detached = host.disconnected(doc, old);
    doc.release(old);
    detached?;
    host.connected(doc, clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_fragment;

    fn tree(doc: &mut Document, html: &str) -> NodeId {
        parse_fragment(doc, html, &|_| false)
    }

    fn live(doc: &mut Document, html: &str) -> NodeId {
        let root = doc.create_element("div");
        let frag = tree(doc, html);
        for child in doc.children(frag).to_vec() {
            doc.append_child(root, child);
        }
        doc.release(frag);
        root
    }

    #[test]
    fn test_identical_tree_is_structural_noop() {
        let mut doc = Document::new();
        let html = "<ul class=\"a\"><li>one</li><li>two</li></ul><p>x</p>";
        let current = live(&mut doc, html);
        let leaves: Vec<NodeId> = doc
            .descendant_elements(current)
            .iter()
            .flat_map(|&el| doc.children(el).to_vec())
            .collect();
        let next = tree(&mut doc, html);

        let stats = patch(&mut doc, &mut (), current, next, None).unwrap();
        assert!(stats.is_structurally_unchanged());
        assert_eq!(doc.inner_html(current), html);
        for leaf in leaves {
            assert!(doc.contains(leaf));
        }
    }

    #[test]
    fn test_truncation_removes_trailing_only() {
        let mut doc = Document::new();
        let current = live(&mut doc, "<i>1</i><i>2</i><i>3</i><i>4</i><i>5</i>");
        let kept: Vec<NodeId> = doc.children(current)[..3].to_vec();
        let dropped: Vec<NodeId> = doc.children(current)[3..].to_vec();
        let next = tree(&mut doc, "<i>1</i><i>2</i><i>3</i>");

        let stats = patch(&mut doc, &mut (), current, next, None).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.replaced, 0);
        assert_eq!(stats.inserted, 0);
        assert_eq!(doc.children(current), kept.as_slice());
        assert!(dropped.iter().all(|&d| !doc.contains(d)));
    }

    #[test]
    fn test_truncation_is_positional() {
        let mut doc = Document::new();
        let current = live(&mut doc, "<a></a><b></b><c></c>");
        let a = doc.children(current)[0];
        let next = tree(&mut doc, "<b></b><c></c>");

        let stats = patch(&mut doc, &mut (), current, next, None).unwrap();
        // The tail goes, then every remaining position mismatches
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.replaced, 2);
        assert!(!doc.contains(a));
        assert_eq!(doc.inner_html(current), "<b></b><c></c>");
    }

    #[test]
    fn test_text_change_replaces_text_node_only() {
        let mut doc = Document::new();
        let current = live(&mut doc, "<span>0</span>");
        let span = doc.children(current)[0];
        let old_text = doc.children(span)[0];
        let next = tree(&mut doc, "<span>1</span>");

        let stats = patch(&mut doc, &mut (), current, next, None).unwrap();
        assert_eq!(stats.replaced, 1);
        assert_eq!(doc.children(current)[0], span);
        assert!(!doc.contains(old_text));
        assert_eq!(doc.inner_html(current), "<span>1</span>");
    }

    #[test]
    fn test_attributes_fully_replaced() {
        let mut doc = Document::new();
        let current = live(&mut doc, "<p class=a title=t></p>");
        let next = tree(&mut doc, "<p id=b></p>");

        patch(&mut doc, &mut (), current, next, None).unwrap();
        assert_eq!(doc.inner_html(current), "<p id=\"b\"></p>");
    }

    #[test]
    fn test_style_node_is_prepended() {
        let mut doc = Document::new();
        let current = live(&mut doc, "");
        let next = tree(&mut doc, "<p>hi</p>");
        let style = doc.create_element("style");
        let css = doc.create_text("p{}");
        doc.append_child(style, css);

        let stats = patch(&mut doc, &mut (), current, next, Some(style)).unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(doc.inner_html(current), "<style>p{}</style><p>hi</p>");

        // Second pass with the same style is structurally unchanged
        let next = tree(&mut doc, "<p>hi</p>");
        let stats = patch(&mut doc, &mut (), current, next, Some(style)).unwrap();
        assert!(stats.is_structurally_unchanged());
    }

    #[test]
    fn test_next_is_left_intact() {
        let mut doc = Document::new();
        let current = live(&mut doc, "");
        let next = tree(&mut doc, "<b>x</b>");
        patch(&mut doc, &mut (), current, next, None).unwrap();
        assert_eq!(doc.inner_html(next), "<b>x</b>");
        assert_ne!(doc.children(current)[0], doc.children(next)[0]);
    }
}
