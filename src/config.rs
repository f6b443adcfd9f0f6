//! Runtime configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! inject_styles = true
//! eviction = "render_pass"
//! key_prefix = "k"
//! frame_interval_ms = 16
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// When callback registry entries are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Never drop entries. The registry grows with every render.
    Retain,
    /// Drop an instance's entries when the instance is destroyed.
    Instance,
    /// As `Instance`, and also drop an instance's entries from earlier passes
    /// once a render pass completes.
    #[default]
    RenderPass,
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Prepend the definition's `<style>` element on every render.
    pub inject_styles: bool,
    /// Callback registry eviction.
    pub eviction: EvictionPolicy,
    /// Prefix of generated registry keys. Emitted unquoted into attributes.
    pub key_prefix: String,
    /// Frame length used by [`FrameClock`](crate::scheduler::FrameClock).
    pub frame_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inject_styles: true,
            eviction: EvictionPolicy::default(),
            key_prefix: "k".to_string(),
            frame_interval_ms: 16,
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig =
            toml::from_str(content).map_err(|source| ConfigError::ParseError { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The key prefix is non-empty and survives unquoted in an attribute
    /// - The frame interval is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "key_prefix must not be empty".to_string(),
            });
        }

        let unsafe_char = self
            .key_prefix
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '=' | '`' | '/'));
        if let Some(c) = unsafe_char {
            return Err(ConfigError::ValidationError {
                message: format!("key_prefix contains '{c}', which cannot appear in an unquoted attribute"),
            });
        }

        if self.frame_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                message: "frame_interval_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Frame length as a [`Duration`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = RuntimeConfig::from_toml("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.eviction, EvictionPolicy::RenderPass);
    }

    #[test]
    fn test_partial_document() {
        let config = RuntimeConfig::from_toml("eviction = \"retain\"\nkey_prefix = \"cb\"").unwrap();
        assert_eq!(config.eviction, EvictionPolicy::Retain);
        assert_eq!(config.key_prefix, "cb");
        assert!(config.inject_styles);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_rejects_bad_prefix() {
        let err = RuntimeConfig::from_toml("key_prefix = \"a b\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));

        let err = RuntimeConfig::from_toml("key_prefix = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = RuntimeConfig::from_toml("frame_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = RuntimeConfig::from_toml("eviction = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = RuntimeConfig::load("/nonexistent/spark-dom.toml").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }
}
