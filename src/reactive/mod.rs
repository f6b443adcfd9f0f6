//! Reactive state and effects of a component instance.
//!
//! This is whole-subtree reactivity: an effective write to reactive state
//! schedules a render of the owning instance, and after the render the
//! instance's effects are re-evaluated. There is no dependency tracking;
//! every getter runs after every pass.
//!
//! # Example
//!
//! ```ignore
//! fn setup(&mut self, ctx: &mut Ctx) -> HookResult {
//!     ctx.reactive([("count", 0.into())]);
//!     ctx.watch(|ctx| ctx.get("count"), |_, new, old| {
//!         tracing::info!(%old, %new, "count changed");
//!         Ok(())
//!     });
//!     Ok(())
//! }
//! ```

mod effect;
mod state;

pub use effect::{Computed, EffectCallback, EffectRegistry, Getter};
pub(crate) use effect::run_effects;
pub use state::State;
