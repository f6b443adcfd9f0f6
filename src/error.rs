//! Runtime error types.
//!
//! The runtime has a deliberately small failure surface: structural mismatches
//! during patching are resolved by replacement and never surface here. What
//! does surface is user code failing (hooks, handlers) and registry keys that
//! cannot be resolved at the point they are used.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dom::NodeId;
use crate::types::InstanceId;

/// Errors produced by the component runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Tag is not a valid custom element name.
    #[error("'{tag}' is not a valid component tag (lowercase, must contain '-')")]
    InvalidTag { tag: String },

    /// A definition for the tag already exists.
    #[error("component '{tag}' is already defined")]
    DuplicateDefinition { tag: String },

    /// Node id is stale or was never allocated.
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),

    /// Inserting `child` under `parent` would make a node its own ancestor.
    #[error("cannot insert {child:?} under {parent:?}: it is an ancestor of the parent")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    /// Node does not host a live component instance.
    #[error("node {0:?} does not host a component instance")]
    NotAComponent(NodeId),

    /// Instance was destroyed (its host left the document).
    #[error("component instance {0} is not attached")]
    Detached(InstanceId),

    /// Listener key has no registry entry.
    #[error("no callback registered under key '{key}' (event '{event}')")]
    UnknownCallback { key: String, event: String },

    /// Listener key resolves to something that cannot be called.
    #[error("registry entry '{key}' is not callable (event '{event}')")]
    NotCallable { key: String, event: String },

    /// `ref` attribute key has no registry entry.
    #[error("no ref cell registered under key '{key}'")]
    UnknownRef { key: String },

    /// `ref` attribute key resolves to something other than a ref cell.
    #[error("registry entry '{key}' is not a ref cell")]
    NotARef { key: String },

    /// A lifecycle hook returned an error.
    #[error("{hook} hook of <{tag}> failed: {source}")]
    Hook {
        tag: String,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// An event handler returned an error.
    #[error("handler for '{event}' failed: {source}")]
    Handler {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used across the crate.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Result type returned by component hooks and handlers.
pub type HookResult<T = ()> = anyhow::Result<T>;
