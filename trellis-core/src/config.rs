//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "reactive": { "scheduling": "immediate", "max_effect_runs": 10000 },
//!   "defer": { "load_timeout_ms": 5000 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reactive: ReactiveConfig,
    pub defer: DeferConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// When queued effects run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectScheduling {
    /// Flush as soon as the outermost write or batch returns.
    #[default]
    Immediate,

    /// Queue until the host calls `flush_effects`, e.g. once per frame.
    Manual,
}

/// Settings for the reactive graph. Applied per thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    pub scheduling: EffectScheduling,

    /// Upper bound on effect runs in one flush. An effect that keeps writing
    /// to its own dependencies hits this and the flush is abandoned.
    pub max_effect_runs: usize,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            scheduling: EffectScheduling::Immediate,
            max_effect_runs: 10_000,
        }
    }
}

/// Settings for deferred fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferConfig {
    /// Loads running longer than this end in the error state.
    pub load_timeout_ms: Option<u64>,
}

impl DeferConfig {
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reactive.scheduling, EffectScheduling::Immediate);
        assert_eq!(config.defer.load_timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_json_str(
            r#"{ "reactive": { "scheduling": "manual" }, "defer": { "load_timeout_ms": 250 } }"#,
        )
        .unwrap();

        assert_eq!(config.reactive.scheduling, EffectScheduling::Manual);
        assert_eq!(config.reactive.max_effect_runs, 10_000);
        assert_eq!(config.defer.load_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unknown_scheduling_is_rejected() {
        let err = Config::from_json_str(r#"{ "reactive": { "scheduling": "lazy" } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::from_path("/nonexistent/trellis.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
