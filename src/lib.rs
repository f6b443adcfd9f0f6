//! # spark-dom
//!
//! Reactive Web Component Runtime for Rust.
//!
//! ## Architecture
//!
//! A component declares a template, a body of state and lifecycle hooks; the
//! runtime keeps what it rendered in sync with its state. Nodes live in a
//! generational arena ([`Document`]) and components are upgraded onto host
//! elements when those are connected to the document.
//!
//! Every state change travels the same pipeline:
//! ```text
//! Ctx::set → scheduled frame → render hook → Composer → parse → patch → bind events → on_updated → effects
//! ```
//!
//! Writes within one frame collapse into a single render. The patch engine
//! reconciles by position, descends into nested component instances by pushing
//! them new props, and re-binds listeners and refs after every pass.
//!
//! ## Modules
//!
//! - [`types`] - Core types (Value, Callback, NodeRef, Event)
//! - [`dom`] - Node arena, fragment parser, serializer
//! - [`markup`] - Template composer and callback registry
//! - [`reactive`] - Instance state and effects
//! - [`scheduler`] - Frame scheduling (manual and frame clock)
//! - [`patch`] - Diff/patch engine and event re-binding
//! - [`component`] - Component trait, definitions, hook context
//! - [`runtime`] - Runtime tying it all together
//! - [`config`] - Runtime configuration

pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod markup;
pub mod patch;
pub mod reactive;
pub mod runtime;
pub mod scheduler;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use component::{Component, Ctx, Definition, InstanceData, Lifecycle, Props, is_valid_tag};

pub use config::{ConfigError, EvictionPolicy, RuntimeConfig};

pub use dom::{Attr, Document, NodeId, NodeKind, parse_fragment};

pub use error::{HookResult, Result, RuntimeError};

pub use markup::{CallbackKey, CallbackRegistry, Composer, is_binding_attribute};

pub use patch::{PatchHost, PatchStats, bind_events, patch};

pub use reactive::{Computed, EffectRegistry, State};

pub use runtime::Runtime;

pub use scheduler::{FrameClock, FrameHandle, FrameScheduler, ManualScheduler};
