//! Per-instance data owned by the runtime.

use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::debug;

use crate::dom::{Document, NodeId};
use crate::markup::CallbackRegistry;
use crate::reactive::{EffectRegistry, State};
use crate::scheduler::FrameHandle;
use crate::types::{InstanceId, Value};

use super::{Component, Definition};

/// Props: attribute name (`p:` stripped) to resolved value.
pub type Props = HashMap<String, Value>;

bitflags! {
    /// Where an instance is in its lifecycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lifecycle: u8 {
        /// Host is connected and the instance is live.
        const ATTACHED = 1 << 0;
        /// `on_mounted` has run.
        const MOUNTED = 1 << 1;
        /// A render pass is in progress.
        const RENDERING = 1 << 2;
    }
}

/// Everything an instance owns besides its component object.
#[derive(Debug)]
pub struct InstanceData {
    pub(crate) id: InstanceId,
    pub(crate) host: NodeId,
    pub(crate) props: Props,
    pub(crate) prev_props: Props,
    pub(crate) state: State,
    pub(crate) effects: EffectRegistry,
    /// Handle of the scheduled render, if one is pending.
    pub(crate) pending: Option<FrameHandle>,
    pub(crate) lifecycle: Lifecycle,
    /// Render passes started; numbers registry entries.
    pub(crate) passes: u64,
    /// Render passes completed.
    pub(crate) renders: u64,
}

impl InstanceData {
    pub(crate) fn new(id: InstanceId, host: NodeId, props: Props) -> Self {
        Self {
            id,
            host,
            props,
            prev_props: Props::new(),
            state: State::new(),
            effects: EffectRegistry::default(),
            pending: None,
            lifecycle: Lifecycle::ATTACHED,
            passes: 0,
            renders: 0,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Replace props, keeping the old set for compare-first renders.
    pub(crate) fn push_props(&mut self, props: Props) {
        self.prev_props = std::mem::replace(&mut self.props, props);
    }
}

/// A live component instance.
pub(crate) struct Instance {
    pub(crate) definition: Rc<Definition>,
    /// Shadow root the instance renders into.
    pub(crate) root: NodeId,
    /// Taken out while one of its hooks runs.
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) data: InstanceData,
}

/// Build props from the attributes of `node`.
///
/// Names lose a `p:` prefix; values are registry keys. A key with no entry
/// resolves to `Null`.
pub(crate) fn resolve_props(doc: &Document, registry: &CallbackRegistry, node: NodeId) -> Props {
    let mut props = Props::new();
    for attr in doc.attrs(node) {
        let name = attr.name.strip_prefix("p:").unwrap_or(&attr.name);
        let value = match registry.resolve(&attr.value) {
            Some(value) => value.clone(),
            None => {
                debug!(attribute = %attr.name, key = %attr.value, "prop key not in registry");
                Value::Null
            }
        };
        props.insert(name.to_string(), value);
    }
    props
}

/// Shallow comparison used by compare-first renders: every previous key is
/// present in `current` with an equal value. Added keys do not count.
pub(crate) fn props_unchanged(previous: &Props, current: &Props) -> bool {
    previous
        .iter()
        .all(|(key, value)| current.get(key).is_some_and(|v| v == value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::handler;

    #[test]
    fn test_resolve_props() {
        let mut doc = Document::new();
        let mut registry = CallbackRegistry::new("k");
        let key = registry.register(InstanceId(0), 1, Value::from(5));

        let host = doc.create_component("x-a");
        doc.set_attr(host, "p:count", key.as_str());
        doc.set_attr(host, "title", "plain");

        let props = resolve_props(&doc, &registry, host);
        assert_eq!(props.get("count"), Some(&Value::from(5)));
        assert_eq!(props.get("title"), Some(&Value::Null));
    }

    #[test]
    fn test_props_unchanged() {
        let a: Props = [("n".to_string(), Value::from(1))].into();
        let b: Props = [("n".to_string(), Value::from(1))].into();
        let c: Props = [("n".to_string(), Value::from(2))].into();
        let d: Props = [("n".to_string(), Value::from(1)), ("m".to_string(), Value::Null)].into();

        assert!(props_unchanged(&a, &b));
        assert!(!props_unchanged(&a, &c));
        // Superset of the previous props
        assert!(props_unchanged(&a, &d));
        // A previous key went missing
        assert!(!props_unchanged(&d, &a));
        // Nothing to compare against
        assert!(props_unchanged(&Props::new(), &a));
        assert!(props_unchanged(&Props::new(), &Props::new()));
    }

    #[test]
    fn test_fresh_closures_differ() {
        let a: Props = [("f".to_string(), Value::from(handler(|_, _| Ok(()))))].into();
        let b: Props = [("f".to_string(), Value::from(handler(|_, _| Ok(()))))].into();
        assert!(!props_unchanged(&a, &b));
        assert!(props_unchanged(&a, &a.clone()));
    }

    #[test]
    fn test_push_props() {
        let mut data = InstanceData::new(InstanceId(0), Document::new().root(), Props::new());
        data.push_props([("x".to_string(), Value::from(true))].into());
        assert!(data.prev_props.is_empty());
        assert_eq!(data.props().len(), 1);
        assert!(data.lifecycle().contains(Lifecycle::ATTACHED));
    }
}
