//! Components - definitions, instances and the hook context.
//!
//! A [`Definition`] names a tag and knows how to build the [`Component`] that
//! backs each host element carrying that tag. Once a host is connected to the
//! document, the runtime upgrades it into an instance:
//!
//! ```text
//! connect ─► open render root ─► read props ─► setup ─► render ─► on_mounted
//!                                                         ▲
//!                    scheduled / forced render ───────────┘
//!                    (patch ─► bind events ─► on_updated ─► effects)
//! disconnect ─► on_unmounted ─► destroy
//! ```
//!
//! All hooks are optional and receive a [`Ctx`] for the instance.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::{html, Component, Composer, Ctx, Definition, HookResult};
//!
//! #[derive(Default)]
//! struct Greeting;
//!
//! impl Component for Greeting {
//!     fn render(&mut self, ctx: &Ctx, h: &mut Composer) -> HookResult<Option<String>> {
//!         Ok(Some(html!(h => "<p>Hello " {ctx.prop("name")} "</p>")))
//!     }
//! }
//!
//! runtime.define(Definition::new("x-greeting", Greeting::default).with_style("p { color: red }"))?;
//! ```

mod context;
mod instance;

pub use context::Ctx;
pub use instance::{InstanceData, Lifecycle, Props};
pub(crate) use instance::{Instance, props_unchanged, resolve_props};

use std::fmt;
use std::rc::Rc;

use crate::error::HookResult;
use crate::markup::Composer;

// =============================================================================
// Component trait
// =============================================================================

/// Lifecycle hooks of a component. Every hook has a no-op default.
pub trait Component {
    /// Runs once, after props are read and before the first render.
    fn setup(&mut self, _ctx: &mut Ctx<'_>) -> HookResult {
        Ok(())
    }

    /// Produce the markup of the render root. `None` renders nothing.
    fn render(&mut self, _ctx: &Ctx<'_>, _h: &mut Composer<'_>) -> HookResult<Option<String>> {
        Ok(None)
    }

    /// Runs once, after the first render.
    fn on_mounted(&mut self, _ctx: &mut Ctx<'_>) -> HookResult {
        Ok(())
    }

    /// Runs after every completed patch, before effects.
    fn on_updated(&mut self, _ctx: &mut Ctx<'_>) -> HookResult {
        Ok(())
    }

    /// Runs once, when the host leaves the document.
    fn on_unmounted(&mut self, _ctx: &mut Ctx<'_>) -> HookResult {
        Ok(())
    }
}

type Factory = dyn Fn() -> Box<dyn Component>;

// =============================================================================
// Definition
// =============================================================================

/// A named component: tag, static style and instance factory.
#[derive(Clone)]
pub struct Definition {
    tag: String,
    style: String,
    factory: Rc<Factory>,
}

impl Definition {
    /// Define `tag`, building instances with `factory`.
    pub fn new<C, F>(tag: impl Into<String>, factory: F) -> Self
    where
        C: Component + 'static,
        F: Fn() -> C + 'static,
    {
        Self {
            tag: tag.into(),
            style: String::new(),
            factory: Rc::new(move || Box::new(factory()) as Box<dyn Component>),
        }
    }

    /// Style injected at the top of the render root on every render.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Component> {
        (self.factory)()
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("tag", &self.tag)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

/// Whether `tag` can name a component: starts with a lowercase ASCII letter,
/// contains a hyphen, and uses only lowercase letters, digits, `-`, `.`, `_`.
pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_ok
        && tag.contains('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags() {
        assert!(is_valid_tag("x-counter"));
        assert!(is_valid_tag("my-app2"));
        assert!(!is_valid_tag("counter"));
        assert!(!is_valid_tag("X-Counter"));
        assert!(!is_valid_tag("-x"));
        assert!(!is_valid_tag(""));
    }

    #[test]
    fn test_definition() {
        struct Empty;
        impl Component for Empty {}

        let def = Definition::new("x-empty", || Empty).with_style("p {}");
        assert_eq!(def.tag(), "x-empty");
        assert_eq!(def.style(), "p {}");
        let _instance = def.instantiate();
    }
}
