//! Host Document - Node arena standing in for the browser DOM.
//!
//! The runtime needs exactly the primitives a document object model offers:
//! node creation, attribute storage, deep cloning, child list surgery,
//! shadow roots and connectedness. They live here so the reactive pipeline
//! has something concrete to patch.
//!
//! # Architecture
//!
//! Nodes are NOT objects. They are generational indices into one arena:
//!
//! ```text
//! Slot 0: Document            (gen 0, children=[1])
//! Slot 1: <x-counter>         (gen 0, shadow=2, instance=#0)
//! Slot 2: #shadow-root        (gen 0, host=1, children=[3, 4])
//! Slot 3: <style>             (gen 0, children=[5])
//! ...
//! ```
//!
//! Released slots go to a free pool and are reused with a bumped generation,
//! so a stale [`NodeId`] resolves to nothing instead of aliasing a new node.
//! Queries on stale ids return `None` or an empty slice; mutations on stale
//! ids are no-ops.

mod parse;
mod serialize;

pub use parse::parse_fragment;
pub use serialize::{inner_html, outer_html};

use std::collections::HashMap;

use crate::markup::CallbackKey;
use crate::types::InstanceId;

// =============================================================================
// Types
// =============================================================================

/// Generational handle to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Arena slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// What a node is. Decided once, when the node is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root. Everything connected descends from it.
    Document,
    /// Detached container, e.g. the result of parsing markup.
    Fragment,
    /// Render root attached to a component host.
    ShadowRoot,
    /// Plain element.
    Element { tag: String },
    /// Element whose tag names a component definition.
    Component { tag: String },
    Text(String),
    Comment(String),
}

impl NodeKind {
    /// DOM node name, used to decide whether two nodes correspond.
    pub fn node_name(&self) -> &str {
        match self {
            NodeKind::Document => "#document",
            NodeKind::Fragment => "#document-fragment",
            NodeKind::ShadowRoot => "#shadow-root",
            NodeKind::Element { tag } | NodeKind::Component { tag } => tag,
            NodeKind::Text(_) => "#text",
            NodeKind::Comment(_) => "#comment",
        }
    }

    /// Whether the node carries attributes.
    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element { .. } | NodeKind::Component { .. })
    }
}

/// A single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: Vec<Attr>,
    /// Shadow root attached to this host.
    shadow: Option<NodeId>,
    /// Host of this shadow root.
    host: Option<NodeId>,
    /// Component instance upgraded onto this host.
    instance: Option<InstanceId>,
    /// Event name -> registry key.
    listeners: HashMap<String, CallbackKey>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attrs: Vec::new(),
            shadow: None,
            host: None,
            instance: None,
            listeners: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

// =============================================================================
// Document
// =============================================================================

/// Node arena with a connected document root.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
        };
        doc.root = doc.alloc(NodeKind::Document);
        doc
    }

    /// The document root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes (including the root).
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = Some(NodeData::new(kind));
        // Reuse free slot or allocate new
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = data;
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, data });
            NodeId { index, generation: 0 }
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        })
    }

    /// Create an element that will host a component instance once connected.
    pub fn create_component(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Component {
            tag: tag.to_ascii_lowercase(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    /// Release a detached subtree back to the pool.
    ///
    /// Also releases attached shadow roots. The node is unlinked from its
    /// parent first if it still has one. Releasing the document root is
    /// ignored.
    pub fn release(&mut self, id: NodeId) {
        if id == self.root || !self.contains(id) {
            return;
        }
        self.remove(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index()) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(data) = slot.data.take() {
                stack.extend(data.children);
                stack.extend(data.shadow);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    /// Node name (`#text`, tag name, ...). Empty for stale ids.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.kind.node_name()).unwrap_or("")
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.kind(id).is_some_and(NodeKind::is_element)
    }

    /// Tag of a component host, if `id` is one.
    pub fn component_tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Component { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Concatenated text of all descendant text nodes.
    ///
    /// For a text or comment node this is its own data.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        match self.kind(id) {
            Some(NodeKind::Text(text)) | Some(NodeKind::Comment(text)) => out.push_str(text),
            Some(_) => self.collect_text(id, &mut out),
            None => {}
        }
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for &child in self.children(id) {
            match self.kind(child) {
                Some(NodeKind::Text(text)) => out.push_str(text),
                Some(NodeKind::Comment(_)) | None => {}
                Some(_) => self.collect_text(child, out),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tree surgery
    // -------------------------------------------------------------------------

    /// Append `child` to `parent`, unlinking it from any previous parent.
    ///
    /// Does nothing when `child` is `parent` or one of its ancestors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) || self.is_ancestor_or_self(child, parent) {
            return;
        }
        self.remove(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Put `new` in the position of `old` under `parent`. `old` ends detached.
    pub fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) {
        if self.parent(old) != Some(parent) || !self.contains(new) || new == old {
            return;
        }
        if self.is_ancestor_or_self(new, parent) {
            return;
        }
        self.remove(new);
        let Some(p) = self.node_mut(parent) else { return };
        let Some(pos) = p.children.iter().position(|&c| c == old) else {
            return;
        };
        p.children[pos] = new;
        if let Some(n) = self.node_mut(new) {
            n.parent = Some(parent);
        }
        if let Some(o) = self.node_mut(old) {
            o.parent = None;
        }
    }

    /// Unlink `child` from its parent. The subtree stays alive.
    pub fn remove(&mut self, child: NodeId) {
        let Some(parent) = self.parent(child) else { return };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = None;
        }
    }

    /// Deep clone of `id`: kind, attributes and children.
    ///
    /// Shadow roots, instance bindings and listeners are not cloned.
    pub fn clone_deep(&mut self, id: NodeId) -> NodeId {
        let (kind, attrs, children) = match self.node(id) {
            Some(n) => (n.kind.clone(), n.attrs.clone(), n.children.clone()),
            None => return self.create_fragment(),
        };
        let copy = self.alloc(kind);
        if let Some(n) = self.node_mut(copy) {
            n.attrs = attrs;
        }
        for child in children {
            let child_copy = self.clone_deep(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    pub fn attrs(&self, id: NodeId) -> &[Attr] {
        self.node(id).map(|n| n.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn get_attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(node) = self.node_mut(id) else { return };
        if !node.kind.is_element() {
            return;
        }
        let name = name.to_ascii_lowercase();
        match node.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value.to_string(),
            None => node.attrs.push(Attr::new(name, value)),
        }
    }

    /// Remove an attribute. Removing an `on*` attribute also drops its listener.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        let Some(node) = self.node_mut(id) else { return };
        node.attrs.retain(|a| a.name != name);
        if let Some(event) = name.strip_prefix("on") {
            node.listeners.remove(event);
        }
    }

    /// Remove every attribute (and with them every listener).
    pub fn clear_attrs(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else { return };
        node.attrs.clear();
        node.listeners.clear();
    }

    // -------------------------------------------------------------------------
    // Shadow roots and connectedness
    // -------------------------------------------------------------------------

    /// Open the shadow root of `host`, creating it on first call.
    pub fn attach_shadow(&mut self, host: NodeId) -> Option<NodeId> {
        if !self.is_element(host) {
            return None;
        }
        if let Some(existing) = self.shadow_root(host) {
            return Some(existing);
        }
        let shadow = self.alloc(NodeKind::ShadowRoot);
        if let Some(s) = self.node_mut(shadow) {
            s.host = Some(host);
        }
        if let Some(h) = self.node_mut(host) {
            h.shadow = Some(shadow);
        }
        Some(shadow)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.node(host)?.shadow
    }

    /// Host of a shadow root.
    pub fn host_of(&self, shadow: NodeId) -> Option<NodeId> {
        self.node(shadow)?.host
    }

    /// Whether `id` reaches the document root through parents and shadow hosts.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            let Some(data) = self.node(node) else { return false };
            current = data.parent.or(data.host);
        }
        false
    }

    /// Whether `ancestor` is `id` or reached from it through parents and
    /// shadow hosts.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.node(node).and_then(|data| data.parent.or(data.host));
        }
        false
    }

    /// Elements below `id` in tree order, not entering shadow roots.
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                out.push(node);
            }
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// `id` and everything below it in tree order, entering shadow roots
    /// right after their host.
    pub fn shadow_including_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            let Some(data) = self.node(node) else { continue };
            out.push(node);
            stack.extend(data.children.iter().rev());
            stack.extend(data.shadow);
        }
        out
    }

    // -------------------------------------------------------------------------
    // Instance bindings and listeners
    // -------------------------------------------------------------------------

    /// Component instance upgraded onto `host`.
    pub fn instance(&self, host: NodeId) -> Option<InstanceId> {
        self.node(host)?.instance
    }

    pub(crate) fn set_instance(&mut self, host: NodeId, instance: Option<InstanceId>) {
        if let Some(node) = self.node_mut(host) {
            node.instance = instance;
        }
    }

    /// Registry key listening for `event` on `id`.
    pub fn listener(&self, id: NodeId, event: &str) -> Option<&CallbackKey> {
        self.node(id)?.listeners.get(event)
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        self.node(id).map(|n| n.listeners.len()).unwrap_or(0)
    }

    pub(crate) fn set_listener(&mut self, id: NodeId, event: &str, key: CallbackKey) {
        if let Some(node) = self.node_mut(id) {
            node.listeners.insert(event.to_string(), key);
        }
    }

    pub(crate) fn clear_listeners(&mut self, id: NodeId) {
        if let Some(node) = self.node_mut(id) {
            node.listeners.clear();
        }
    }

    /// Markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        inner_html(self, id)
    }

    /// Markup of `id` itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        outer_html(self, id)
    }
}

// =============================================================================
// Tests
// =============================================================================
