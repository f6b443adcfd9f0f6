//! Runtime - the document, the component table and the render pipeline.
//!
//! # Render pass
//!
//! ```text
//! render hook ─► parse ─► <style> ─► patch ─► bind events ─► on_updated ─► effects ─► evict
//! ```
//!
//! The order is fixed. A failing step ends the pass with an error; whatever
//! the patch already did stays, nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::{Runtime, Definition};
//!
//! let mut runtime = Runtime::new();
//! runtime.define(Definition::new("x-counter", Counter::default))?;
//! let host = runtime.mount("<x-counter></x-counter>")?[0];
//!
//! runtime.with_component(host, |ctx| ctx.set("count", 1))?;
//! runtime.flush()?; // one render
//! println!("{}", runtime.shadow_html(host).unwrap_or_default());
//! ```

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::component::{
    Component, Ctx, Definition, Instance, InstanceData, Lifecycle, Props, is_valid_tag,
    props_unchanged, resolve_props,
};
use crate::config::{EvictionPolicy, RuntimeConfig};
use crate::dom::{Document, NodeId, parse_fragment};
use crate::error::{HookResult, Result, RuntimeError};
use crate::markup::{CallbackRegistry, Composer};
use crate::patch::{self, PatchHost, bind_events};
use crate::reactive::run_effects;
use crate::scheduler::{FrameClock, FrameScheduler, ManualScheduler};
use crate::types::{Event, InstanceId, Value};

// =============================================================================
// Runtime
// =============================================================================

/// A document plus the components living in it.
pub struct Runtime {
    doc: Document,
    engine: Engine,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Default configuration, frames fire on [`flush`](Self::flush).
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default(), Box::new(ManualScheduler::new()))
    }

    /// Validated configuration, frames fire on [`flush`](Self::flush).
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(ManualScheduler::new())))
    }

    /// Validated configuration, frames aligned to `frame_interval_ms`.
    pub fn with_frame_clock(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let clock = FrameClock::new(config.frame_interval());
        Ok(Self::build(config, Box::new(clock)))
    }

    /// Validated configuration and a custom scheduler.
    pub fn with_scheduler(config: RuntimeConfig, scheduler: Box<dyn FrameScheduler>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, scheduler))
    }

    fn build(config: RuntimeConfig, scheduler: Box<dyn FrameScheduler>) -> Self {
        let registry = CallbackRegistry::new(config.key_prefix.clone());
        Self {
            doc: Document::new(),
            engine: Engine {
                config,
                definitions: HashMap::new(),
                instances: HashMap::new(),
                registry,
                scheduler,
                next_instance: 0,
            },
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.engine.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.engine.registry
    }

    // -------------------------------------------------------------------------
    // Definitions and tree building
    // -------------------------------------------------------------------------

    /// Register a component definition.
    ///
    /// Only elements created after this call (parsed or via
    /// [`create_element`](Self::create_element)) become hosts.
    pub fn define(&mut self, definition: Definition) -> Result<()> {
        let tag = definition.tag().to_string();
        if !is_valid_tag(&tag) {
            return Err(RuntimeError::InvalidTag { tag });
        }
        if self.engine.definitions.contains_key(&tag) {
            return Err(RuntimeError::DuplicateDefinition { tag });
        }
        debug!(tag = %tag, "component defined");
        self.engine.definitions.insert(tag, Rc::new(definition));
        Ok(())
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.engine.definitions.contains_key(tag)
    }

    /// Create a detached element; a host if `tag` is defined.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        if self.engine.definitions.contains_key(&tag) {
            self.doc.create_component(&tag)
        } else {
            self.doc.create_element(&tag)
        }
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.doc.create_text(text)
    }

    /// Set an attribute on a node. Host props are read on connection, so set
    /// them before appending.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.doc.set_attr(node, name, value);
    }

    /// Parse `html` and append the result to the document root.
    ///
    /// Returns the appended top-level nodes.
    pub fn mount(&mut self, html: &str) -> Result<Vec<NodeId>> {
        let definitions = &self.engine.definitions;
        let fragment = parse_fragment(&mut self.doc, html, &|tag| definitions.contains_key(tag));
        let nodes = self.doc.children(fragment).to_vec();
        let root = self.doc.root();
        let mut result = Ok(());
        for &node in &nodes {
            self.doc.append_child(root, node);
            let connected = self.engine.connect(&mut self.doc, node);
            if result.is_ok() {
                result = connected;
            }
        }
        self.doc.release(fragment);
        result.map(|()| nodes)
    }

    /// Append `child` to `parent`, running component lifecycles.
    ///
    /// Moving a connected node disconnects it first. Appending a node under
    /// itself or one of its descendants fails with
    /// [`RuntimeError::HierarchyRequest`].
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.doc.contains(parent) {
            return Err(RuntimeError::MissingNode(parent));
        }
        if !self.doc.contains(child) {
            return Err(RuntimeError::MissingNode(child));
        }
        if child == self.doc.root() {
            return Ok(());
        }
        if self.doc.is_ancestor_or_self(child, parent) {
            return Err(RuntimeError::HierarchyRequest { parent, child });
        }
        if self.doc.is_connected(child) {
            self.doc.remove(child);
            self.engine.disconnect(&mut self.doc, child)?;
        }
        self.doc.append_child(parent, child);
        if self.doc.is_connected(child) {
            self.engine.connect(&mut self.doc, child)?;
        }
        Ok(())
    }

    /// Detach `node` from its parent, running component lifecycles. The node
    /// stays alive and can be appended again.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        if !self.doc.contains(node) {
            return Err(RuntimeError::MissingNode(node));
        }
        if node == self.doc.root() {
            return Ok(());
        }
        let was_connected = self.doc.is_connected(node);
        self.doc.remove(node);
        if was_connected {
            self.engine.disconnect(&mut self.doc, node)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Render every instance whose frame is due. Returns how many rendered.
    ///
    /// A failing render does not stop the others; the first error is
    /// returned after all due instances were processed.
    pub fn flush(&mut self) -> Result<usize> {
        let due = self.engine.scheduler.take_due(Instant::now());
        let mut rendered = 0;
        let mut first_error = None;

        for id in due {
            let Some(inst) = self.engine.instances.get_mut(&id) else {
                continue;
            };
            inst.data.pending = None;
            match self.engine.render(&mut self.doc, id, false) {
                Ok(true) => rendered += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(instance = %id, error = %err, "scheduled render failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(rendered),
        }
    }

    /// Render the instance on `host` now, bypassing the scheduler.
    ///
    /// With `compare_first`, the render is skipped when the props are
    /// unchanged since the previous push. Returns whether it rendered.
    pub fn force_render(&mut self, host: NodeId, compare_first: bool) -> Result<bool> {
        let id = self.instance_of(host)?;
        self.engine.render(&mut self.doc, id, compare_first)
    }

    /// Deliver `event` to the listener on `target`, if any.
    ///
    /// Returns whether a handler ran. The handler runs against the instance
    /// its callback is bound to.
    pub fn dispatch(&mut self, target: NodeId, mut event: Event) -> Result<bool> {
        if !self.doc.contains(target) {
            return Err(RuntimeError::MissingNode(target));
        }
        let Some(key) = self.doc.listener(target, &event.kind).cloned() else {
            return Ok(false);
        };

        let registry = &self.engine.registry;
        let callback = match registry.resolve(key.as_str()) {
            Some(Value::Callback(cb)) => cb.clone(),
            Some(_) => {
                return Err(RuntimeError::NotCallable {
                    key: key.to_string(),
                    event: event.kind,
                });
            }
            None => {
                return Err(RuntimeError::UnknownCallback {
                    key: key.to_string(),
                    event: event.kind,
                });
            }
        };
        let owner = match callback.bound_to().or_else(|| registry.owner(key.as_str())) {
            Some(owner) => owner,
            None => {
                return Err(RuntimeError::UnknownCallback {
                    key: key.to_string(),
                    event: event.kind,
                });
            }
        };

        event.target = Some(target);
        trace!(event = %event.kind, key = %key, instance = %owner, "dispatch");
        let mut ctx = self.engine.ctx(owner)?;
        callback
            .call(&mut ctx, &event)
            .map_err(|source| RuntimeError::Handler {
                event: event.kind.clone(),
                source,
            })?;
        Ok(true)
    }

    /// Run `f` against the instance on `host`.
    pub fn with_component<R>(&mut self, host: NodeId, f: impl FnOnce(&mut Ctx<'_>) -> R) -> Result<R> {
        let id = self.instance_of(host)?;
        let mut ctx = self.engine.ctx(id)?;
        Ok(f(&mut ctx))
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    fn instance_of(&self, host: NodeId) -> Result<InstanceId> {
        if !self.doc.contains(host) {
            return Err(RuntimeError::MissingNode(host));
        }
        self.doc
            .instance(host)
            .filter(|id| self.engine.instances.contains_key(id))
            .ok_or(RuntimeError::NotAComponent(host))
    }

    fn data(&self, host: NodeId) -> Option<&InstanceData> {
        let id = self.doc.instance(host)?;
        self.engine.instances.get(&id).map(|inst| &inst.data)
    }

    /// Light-tree markup of the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        self.doc.inner_html(node)
    }

    /// Render root of a host.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.doc.shadow_root(host)
    }

    /// Markup rendered by the instance on `host`.
    pub fn shadow_html(&self, host: NodeId) -> Option<String> {
        self.doc.shadow_root(host).map(|root| self.doc.inner_html(root))
    }

    /// Elements with `tag` anywhere in the connected tree, render roots
    /// included, in tree order.
    pub fn query_all(&self, tag: &str) -> Vec<NodeId> {
        let tag = tag.to_ascii_lowercase();
        self.doc
            .shadow_including_subtree(self.doc.root())
            .into_iter()
            .filter(|&id| self.doc.is_element(id) && self.doc.node_name(id) == tag)
            .collect()
    }

    pub fn props(&self, host: NodeId) -> Option<&Props> {
        self.data(host).map(InstanceData::props)
    }

    /// Read a state key of the instance on `host`.
    pub fn state_value(&self, host: NodeId, key: &str) -> Option<Value> {
        self.data(host).map(|data| data.state.get(key))
    }

    pub fn lifecycle(&self, host: NodeId) -> Option<Lifecycle> {
        self.data(host).map(InstanceData::lifecycle)
    }

    /// Completed render passes of the instance on `host`; 0 if none lives there.
    pub fn render_count(&self, host: NodeId) -> u64 {
        self.data(host).map(InstanceData::render_count).unwrap_or(0)
    }

    pub fn registry_len(&self) -> usize {
        self.engine.registry.len()
    }

    pub fn pending_renders(&self) -> usize {
        self.engine.scheduler.pending()
    }

    pub fn instance_count(&self) -> usize {
        self.engine.instances.len()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Everything but the document, so the patch engine can borrow the document
/// and call back into the component table at the same time.
struct Engine {
    config: RuntimeConfig,
    definitions: HashMap<String, Rc<Definition>>,
    instances: HashMap<InstanceId, Instance>,
    registry: CallbackRegistry,
    scheduler: Box<dyn FrameScheduler>,
    next_instance: u32,
}

fn hook_error(tag: &str, hook: &'static str, source: anyhow::Error) -> RuntimeError {
    RuntimeError::Hook {
        tag: tag.to_string(),
        hook,
        source,
    }
}

impl Engine {
    fn ctx(&mut self, id: InstanceId) -> Result<Ctx<'_>> {
        let inst = self
            .instances
            .get_mut(&id)
            .ok_or(RuntimeError::Detached(id))?;
        Ok(Ctx::new(&mut inst.data, self.scheduler.as_mut()))
    }

    /// Run a hook with the component taken out of its slot.
    fn call_hook(
        &mut self,
        id: InstanceId,
        hook: &'static str,
        f: impl FnOnce(&mut dyn Component, &mut Ctx<'_>) -> HookResult,
    ) -> Result<()> {
        let Some(inst) = self.instances.get_mut(&id) else {
            return Err(RuntimeError::Detached(id));
        };
        let tag = inst.definition.tag().to_string();
        let Some(mut component) = inst.component.take() else {
            warn!(instance = %id, hook, "hook skipped, component is busy");
            return Ok(());
        };

        let result = {
            let mut ctx = Ctx::new(&mut inst.data, self.scheduler.as_mut());
            f(component.as_mut(), &mut ctx)
        };
        inst.component = Some(component);
        result.map_err(|source| hook_error(&tag, hook, source))
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Upgrade every connected, not yet upgraded host in `node`'s subtree.
    fn connect(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        for id in doc.shadow_including_subtree(node) {
            if doc.component_tag(id).is_some() && doc.instance(id).is_none() && doc.is_connected(id) {
                self.upgrade(doc, id)?;
            }
        }
        Ok(())
    }

    fn upgrade(&mut self, doc: &mut Document, host: NodeId) -> Result<()> {
        let Some(tag) = doc.component_tag(host) else {
            return Err(RuntimeError::NotAComponent(host));
        };
        let Some(definition) = self.definitions.get(tag).cloned() else {
            return Ok(());
        };
        let root = doc.attach_shadow(host).ok_or(RuntimeError::MissingNode(host))?;

        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        let props = resolve_props(doc, &self.registry, host);
        let component = definition.instantiate();
        debug!(instance = %id, tag = definition.tag(), props = props.len(), "attached");

        self.instances.insert(
            id,
            Instance {
                definition,
                root,
                component: Some(component),
                data: InstanceData::new(id, host, props),
            },
        );
        doc.set_instance(host, Some(id));

        self.call_hook(id, "setup", |c, ctx| c.setup(ctx))?;
        self.render(doc, id, false)?;
        self.call_hook(id, "on_mounted", |c, ctx| c.on_mounted(ctx))?;
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.data.lifecycle.insert(Lifecycle::MOUNTED);
        }
        Ok(())
    }

    /// Destroy every instance in `node`'s subtree. All instances are
    /// destroyed even if a hook fails; the first failure is returned.
    fn disconnect(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let mut result = Ok(());
        for id in doc.shadow_including_subtree(node) {
            if let Some(instance) = doc.instance(id) {
                let destroyed = self.destroy(doc, id, instance);
                if result.is_ok() {
                    result = destroyed;
                }
            }
        }
        result
    }

    fn destroy(&mut self, doc: &mut Document, host: NodeId, id: InstanceId) -> Result<()> {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.data.lifecycle.remove(Lifecycle::ATTACHED);
        }
        let unmounted = self.call_hook(id, "on_unmounted", |c, ctx| c.on_unmounted(ctx));

        doc.set_instance(host, None);
        if let Some(inst) = self.instances.remove(&id) {
            if let Some(handle) = inst.data.pending {
                self.scheduler.cancel_frame(handle);
            }
        }
        let evicted = match self.config.eviction {
            EvictionPolicy::Retain => 0,
            EvictionPolicy::Instance | EvictionPolicy::RenderPass => self.registry.evict_owner(id),
        };
        debug!(instance = %id, evicted, "detached");
        unmounted
    }

    // -------------------------------------------------------------------------
    // Render pass
    // -------------------------------------------------------------------------

    /// Render instance `id`. Returns whether a pass ran.
    fn render(&mut self, doc: &mut Document, id: InstanceId, compare_first: bool) -> Result<bool> {
        let Some(inst) = self.instances.get_mut(&id) else {
            return Err(RuntimeError::Detached(id));
        };
        if compare_first && props_unchanged(&inst.data.prev_props, &inst.data.props) {
            trace!(instance = %id, "props unchanged, render skipped");
            return Ok(false);
        }
        let Some(mut component) = inst.component.take() else {
            warn!(instance = %id, "render skipped, component is busy");
            return Ok(false);
        };

        // This pass covers whatever was scheduled
        if let Some(handle) = inst.data.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        inst.data.lifecycle.insert(Lifecycle::RENDERING);
        inst.data.passes += 1;
        let pass = inst.data.passes;
        let definition = inst.definition.clone();
        let root = inst.root;

        let result = self.render_pass(doc, id, component.as_mut(), &definition, root, pass);

        if let Some(inst) = self.instances.get_mut(&id) {
            inst.component = Some(component);
            inst.data.lifecycle.remove(Lifecycle::RENDERING);
            if result.is_ok() {
                inst.data.renders += 1;
            }
        }
        result.map(|()| true)
    }

    fn render_pass(
        &mut self,
        doc: &mut Document,
        id: InstanceId,
        component: &mut dyn Component,
        definition: &Definition,
        root: NodeId,
        pass: u64,
    ) -> Result<()> {
        let tag = definition.tag();

        let (markup, registered) = {
            let inst = self
                .instances
                .get_mut(&id)
                .ok_or(RuntimeError::Detached(id))?;
            let mut composer = Composer::new(&mut self.registry, id, pass);
            let ctx = Ctx::new(&mut inst.data, self.scheduler.as_mut());
            let markup = component
                .render(&ctx, &mut composer)
                .map_err(|source| hook_error(tag, "render", source))?
                .unwrap_or_default();
            (markup, composer.registered())
        };

        let next = {
            let definitions = &self.definitions;
            parse_fragment(doc, &markup, &|t| definitions.contains_key(t))
        };
        let style = self.config.inject_styles.then(|| {
            let style = doc.create_element("style");
            if !definition.style().is_empty() {
                let css = doc.create_text(definition.style());
                doc.append_child(style, css);
            }
            style
        });

        let patched = patch::patch(doc, self, root, next, style);
        doc.release(next);
        if let Some(style) = style {
            doc.release(style);
        }
        let stats = patched?;

        let listeners = bind_events(doc, &self.registry, root)?;
        trace!(
            instance = %id,
            pass,
            inserted = stats.inserted,
            removed = stats.removed,
            replaced = stats.replaced,
            nested = stats.nested_renders,
            registered,
            listeners,
            "patched"
        );

        self.call_hook(id, "on_updated", |c, ctx| c.on_updated(ctx))?;

        let fired = run_effects(&mut self.ctx(id)?).map_err(|source| hook_error(tag, "effect", source))?;
        if fired > 0 {
            trace!(instance = %id, fired, "effects fired");
        }

        if self.config.eviction == EvictionPolicy::RenderPass {
            let evicted = self.registry.evict_before(id, pass);
            if evicted > 0 {
                debug!(instance = %id, evicted, "registry entries evicted");
            }
        }
        Ok(())
    }
}

impl PatchHost for Engine {
    fn connected(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        if doc.is_connected(node) {
            self.connect(doc, node)?;
        }
        Ok(())
    }

    fn disconnected(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.disconnect(doc, node)
    }

    fn update_nested(&mut self, doc: &mut Document, host: NodeId, next: NodeId) -> Result<bool> {
        let Some(id) = doc.instance(host) else {
            return Ok(false);
        };
        let props = resolve_props(doc, &self.registry, next);
        let Some(inst) = self.instances.get_mut(&id) else {
            return Ok(false);
        };
        inst.data.push_props(props);
        self.render(doc, id, true)
    }
}
