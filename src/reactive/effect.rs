//! Effect Registry - (getter, callback, last value) bindings re-evaluated
//! after every completed render pass.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::Ctx;
use crate::types::Value;

pub type Getter = dyn Fn(&Ctx<'_>) -> Value;
pub type EffectCallback = dyn FnMut(&mut Ctx<'_>, Value, Value) -> anyhow::Result<()>;

struct Binding {
    getter: Box<Getter>,
    callback: Box<EffectCallback>,
    last: Value,
}

/// Effect bindings of one instance, in registration order.
#[derive(Default)]
pub struct EffectRegistry {
    bindings: Vec<Binding>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("len", &self.bindings.len())
            .finish()
    }
}

impl EffectRegistry {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn push(&mut self, getter: Box<Getter>, callback: Box<EffectCallback>, seed: Value) {
        self.bindings.push(Binding {
            getter,
            callback,
            last: seed,
        });
    }

    fn take(&mut self) -> Vec<Binding> {
        std::mem::take(&mut self.bindings)
    }

    /// Put `taken` back in front of anything registered while it was out.
    fn restore(&mut self, mut taken: Vec<Binding>) {
        taken.append(&mut self.bindings);
        self.bindings = taken;
    }
}

/// Walk the bindings once, in order.
///
/// Each getter is evaluated; the callback fires with `(old, new)` only when
/// the value changed, and the recorded value is overwritten either way.
/// Returns how many callbacks fired. A failing callback stops the walk.
pub(crate) fn run_effects(ctx: &mut Ctx<'_>) -> anyhow::Result<usize> {
    let mut bindings = ctx.inst.effects.take();
    let mut fired = 0;
    let mut result = Ok(());

    for binding in bindings.iter_mut() {
        let next = (binding.getter)(ctx);
        if next == binding.last {
            binding.last = next;
            continue;
        }
        let old = std::mem::replace(&mut binding.last, next.clone());
        fired += 1;
        if let Err(err) = (binding.callback)(ctx, old, next) {
            result = Err(err);
            break;
        }
    }

    ctx.inst.effects.restore(bindings);
    result.map(|()| fired)
}

/// Cached derived value, refreshed by the effect pass.
///
/// Reading between renders returns the value as of the last completed pass.
#[derive(Clone, Debug, Default)]
pub struct Computed {
    cache: Rc<RefCell<Value>>,
}

impl Computed {
    pub(crate) fn new(seed: Value) -> Self {
        Self {
            cache: Rc::new(RefCell::new(seed)),
        }
    }

    pub(crate) fn store(&self, value: Value) {
        *self.cache.borrow_mut() = value;
    }

    /// Cached value.
    pub fn get(&self) -> Value {
        self.cache.borrow().clone()
    }
}
