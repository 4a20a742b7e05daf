//! Tracker configuration.

use crate::error::{TrackerError, TrackerResult};
use serde::{Deserialize, Serialize};

/// Configuration for the round tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Expected participants for rounds created without an explicit list.
    pub default_participants: Vec<String>,
    /// Buffer between the event listener and the tracker service.
    pub event_buffer_size: usize,
    /// Buffer of the aggregation broadcast channel.
    pub publish_buffer_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_participants: vec!["dbs".to_string(), "ing".to_string(), "ocbc".to_string()],
            event_buffer_size: 256,
            publish_buffer_size: 64,
        }
    }
}

impl TrackerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.default_participants.is_empty() {
            return Err(TrackerError::Config(
                "default_participants must not be empty".to_string(),
            ));
        }
        if self.default_participants.iter().any(|p| p.trim().is_empty()) {
            return Err(TrackerError::Config(
                "default_participants must not contain blank ids".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(TrackerError::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.publish_buffer_size == 0 {
            return Err(TrackerError::Config(
                "publish_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.default_participants, vec!["dbs", "ing", "ocbc"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let config = TrackerConfig {
            default_participants: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            event_buffer_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            default_participants: vec!["dbs".to_string(), " ".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"default_participants":["a","b"]}"#).unwrap();
        assert_eq!(config.default_participants, vec!["a", "b"]);
        assert_eq!(config.event_buffer_size, 256);
    }
}
