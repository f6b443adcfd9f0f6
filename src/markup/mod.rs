//! Markup - template composition and the callback registry behind it.
//!
//! Rendered markup is plain text, but templates interpolate live values:
//! handlers, reference cells and props for nested components. Those values
//! cannot be written into an attribute, so the composer stores them in the
//! [`CallbackRegistry`] and writes the generated key instead. Event binding
//! and prop resolution later turn the key back into the value.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::{html, handler};
//!
//! let on_click = handler(|ctx, _| {
//!     let n = ctx.get("count").as_number().unwrap_or(0.0);
//!     ctx.set("count", n + 1.0);
//!     Ok(())
//! });
//! let markup = html!(h => "<button onclick=" {on_click} ">" {ctx.get("count")} "</button>");
//! // <button onclick=k1f>3</button>
//! ```

mod composer;
mod registry;

pub use composer::{Composer, is_binding_attribute};
pub use registry::{CallbackKey, CallbackRegistry};

/// Compose a template from literal segments and interpolated values.
///
/// `html!(composer => "lit" {value} "lit" ...)` expands to
/// [`Composer::compose`] with every value converted through
/// `Value::from`.
#[macro_export]
macro_rules! html {
    ($composer:expr => $first:literal $({ $value:expr } $seg:literal)*) => {
        $composer.compose(
            &[$first $(, $seg)*],
            vec![$($crate::Value::from($value)),*],
        )
    };
}
