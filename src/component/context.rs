//! Hook context - the reactivity API of one instance.

use crate::dom::NodeId;
use crate::reactive::{Computed, State};
use crate::scheduler::FrameScheduler;
use crate::types::{InstanceId, NodeRef, Value};

use super::instance::{InstanceData, Lifecycle, Props};

/// Access to one instance's props, state, effects and scheduling.
///
/// Handed to every hook, event handler and effect callback.
pub struct Ctx<'a> {
    pub(crate) inst: &'a mut InstanceData,
    pub(crate) scheduler: &'a mut dyn FrameScheduler,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(inst: &'a mut InstanceData, scheduler: &'a mut dyn FrameScheduler) -> Self {
        Self { inst, scheduler }
    }

    pub fn id(&self) -> InstanceId {
        self.inst.id
    }

    /// Host element of the instance.
    pub fn host(&self) -> NodeId {
        self.inst.host
    }

    pub fn props(&self) -> &Props {
        &self.inst.props
    }

    /// A single prop; `Null` when absent.
    pub fn prop(&self, name: &str) -> Value {
        self.inst.props.get(name).cloned().unwrap_or_default()
    }

    /// Props before the latest push from the parent.
    pub fn previous_props(&self) -> &Props {
        &self.inst.prev_props
    }

    pub fn state(&self) -> &State {
        &self.inst.state
    }

    /// Read a state key; `Null` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.inst.state.get(key)
    }

    pub fn is_attached(&self) -> bool {
        self.inst.lifecycle.contains(Lifecycle::ATTACHED)
    }

    pub fn is_mounted(&self) -> bool {
        self.inst.lifecycle.contains(Lifecycle::MOUNTED)
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// Seed state with `initial` and make it reactive.
    ///
    /// Seeding never schedules. From here on every effective [`set`](Self::set)
    /// requests a render.
    pub fn reactive<I, K, V>(&mut self, initial: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, value) in initial {
            self.inst.state.write(key.as_ref(), value.into());
        }
        self.inst.state.make_reactive();
    }

    /// Write a state key. Returns whether the write was effective.
    ///
    /// Effective writes to reactive state request a render; ineffective ones
    /// are absorbed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let effective = self.inst.state.write(key, value.into());
        if effective && self.inst.state.is_reactive() {
            self.request_render();
        }
        effective
    }

    /// Create a reference cell for a `ref=` binding.
    pub fn node_ref(&self, initial: Option<NodeId>) -> NodeRef {
        NodeRef::new(initial)
    }

    // -------------------------------------------------------------------------
    // Effects
    // -------------------------------------------------------------------------

    /// Register an effect. `getter` runs now to seed the last value;
    /// `callback(old, new)` runs after a render pass in which the getter's
    /// value changed.
    pub fn effect<G, C>(&mut self, getter: G, callback: C)
    where
        G: Fn(&Ctx<'_>) -> Value + 'static,
        C: FnMut(&mut Ctx<'_>, Value, Value) -> anyhow::Result<()> + 'static,
    {
        let seed = getter(self);
        self.inst
            .effects
            .push(Box::new(getter), Box::new(callback), seed);
    }

    /// [`effect`](Self::effect) with the callback receiving `(new, old)`.
    pub fn watch<G, C>(&mut self, getter: G, mut callback: C)
    where
        G: Fn(&Ctx<'_>) -> Value + 'static,
        C: FnMut(&mut Ctx<'_>, Value, Value) -> anyhow::Result<()> + 'static,
    {
        self.effect(getter, move |ctx, old, new| callback(ctx, new, old));
    }

    /// Cache `getter` and refresh the cache from the effect pass.
    pub fn computed<G>(&mut self, getter: G) -> Computed
    where
        G: Fn(&Ctx<'_>) -> Value + 'static,
    {
        let computed = Computed::new(getter(self));
        let cache = computed.clone();
        self.effect(getter, move |_, _, new| {
            cache.store(new);
            Ok(())
        });
        computed
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Schedule a render for the next frame, replacing a pending request.
    ///
    /// No-op once the instance is detached.
    pub fn request_render(&mut self) {
        if let Some(handle) = self.inst.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        if self.is_attached() {
            self.inst.pending = Some(self.scheduler.request_frame(self.inst.id));
        }
    }

    /// Whether a render is scheduled for this instance.
    pub fn has_pending_render(&self) -> bool {
        self.inst.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::reactive::run_effects;
    use crate::scheduler::ManualScheduler;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Instant;

    fn data() -> InstanceData {
        InstanceData::new(InstanceId(1), Document::new().root(), Props::new())
    }

    #[test]
    fn test_burst_collapses_to_one_request() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);

        ctx.reactive([("count", 0)]);
        assert!(!ctx.has_pending_render());

        assert!(!ctx.set("count", 0));
        assert!(!ctx.has_pending_render());

        assert!(ctx.set("count", 1));
        assert!(ctx.set("count", 2));
        assert!(ctx.set("count", 3));
        assert_eq!(ctx.get("count"), Value::from(3));
        drop(ctx);

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.take_due(Instant::now()), vec![InstanceId(1)]);
    }

    #[test]
    fn test_plain_state_does_not_schedule() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);
        assert!(ctx.set("x", 1));
        drop(ctx);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_detached_instance_does_not_schedule() {
        let mut inst = data();
        inst.lifecycle.remove(Lifecycle::ATTACHED);
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);
        ctx.reactive([("x", 0)]);
        ctx.set("x", 1);
        drop(ctx);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_effects_fire_on_change_only() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);
        let seen = Rc::new(RefCell::new(Vec::new()));

        ctx.reactive([("a", 1)]);
        let log = seen.clone();
        ctx.effect(
            |ctx| ctx.get("a"),
            move |_, old, new| {
                log.borrow_mut().push((old, new));
                Ok(())
            },
        );
        assert!(seen.borrow().is_empty());

        assert_eq!(run_effects(&mut ctx).unwrap(), 0);
        ctx.set("a", 2);
        assert_eq!(run_effects(&mut ctx).unwrap(), 1);
        assert_eq!(run_effects(&mut ctx).unwrap(), 0);
        assert_eq!(*seen.borrow(), vec![(Value::from(1), Value::from(2))]);
    }

    #[test]
    fn test_watch_argument_order() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);
        let seen = Rc::new(RefCell::new(None));

        ctx.reactive([("a", "x")]);
        let log = seen.clone();
        ctx.watch(
            |ctx| ctx.get("a"),
            move |_, new, old| {
                *log.borrow_mut() = Some((new, old));
                Ok(())
            },
        );
        ctx.set("a", "y");
        run_effects(&mut ctx).unwrap();
        assert_eq!(*seen.borrow(), Some((Value::from("y"), Value::from("x"))));
    }

    #[test]
    fn test_computed_is_stale_between_passes() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);

        ctx.reactive([("n", 2)]);
        let double = ctx.computed(|ctx| {
            Value::from(ctx.get("n").as_number().unwrap_or(0.0) * 2.0)
        });
        assert_eq!(double.get(), Value::from(4));

        ctx.set("n", 5);
        assert_eq!(double.get(), Value::from(4));

        run_effects(&mut ctx).unwrap();
        assert_eq!(double.get(), Value::from(10));
    }

    #[test]
    fn test_effect_registered_during_pass_runs_next_pass() {
        let mut inst = data();
        let mut scheduler = ManualScheduler::new();
        let mut ctx = Ctx::new(&mut inst, &mut scheduler);
        let count = Rc::new(RefCell::new(0));

        ctx.reactive([("a", 0)]);
        let counter = count.clone();
        ctx.effect(
            |ctx| ctx.get("a"),
            move |ctx, _, _| {
                let inner = counter.clone();
                ctx.effect(
                    |ctx| ctx.get("a"),
                    move |_, _, _| {
                        *inner.borrow_mut() += 1;
                        Ok(())
                    },
                );
                Ok(())
            },
        );
        ctx.set("a", 1);
        run_effects(&mut ctx).unwrap();
        assert_eq!(ctx.inst.effects.len(), 2);
        assert_eq!(*count.borrow(), 0);

        ctx.set("a", 2);
        run_effects(&mut ctx).unwrap();
        assert_eq!(*count.borrow(), 1);
    }
}
