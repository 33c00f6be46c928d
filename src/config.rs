use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::chain_error::ChainError;

/// Reserved event name of the built-in delay step.
pub const DEFAULT_DELAY_EVENT: &str = "__SLEEP__";

/// Event name that `batch` translates into a delay.
pub const DEFAULT_BATCH_DELAY_MARKER: &str = "sleep";

/// Engine settings
///
/// Loaded with defaults, then a TOML file, then environment overrides:
///
/// * `EVENT_BRIDGE__DELAY_EVENT`
/// * `EVENT_BRIDGE__BATCH_DELAY_MARKER`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reserved event name the delay handler is registered under
    pub delay_event: String,
    /// Batch items with this event name and a positive `duration` become delays
    pub batch_delay_marker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delay_event: DEFAULT_DELAY_EVENT.into(),
            batch_delay_marker: DEFAULT_BATCH_DELAY_MARKER.into(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ChainError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read `path` if it exists, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_toml_str(&fs::read_to_string(path)?)?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("EVENT_BRIDGE__DELAY_EVENT") {
            if !v.trim().is_empty() {
                self.delay_event = v;
            }
        }
        if let Ok(v) = std::env::var("EVENT_BRIDGE__BATCH_DELAY_MARKER") {
            if !v.trim().is_empty() {
                self.batch_delay_marker = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(r#"delay_event = "__WAIT__""#).expect("parse");
        assert_eq!(config.delay_event, "__WAIT__");
        assert_eq!(config.batch_delay_marker, DEFAULT_BATCH_DELAY_MARKER);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = EngineConfig::from_toml_str("delay_event = [").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load("/nonexistent/event_bridge.toml").expect("load");
        assert!(!config.delay_event.is_empty());
    }
}
