//! # Host Configuration
//!
//! The TOML file the host starts from:
//!
//! ```toml
//! poll_interval_secs = 60
//! listen = "127.0.0.1:8080"
//!
//! [[chores]]
//! id = "laundry"
//! name = "Hang the laundry"
//! trigger = { type = "power_cycle", power_sensor = "sensor.washer_power" }
//! completion = { type = "contact", entity_id = "binary_sensor.washer_door" }
//! ```
//!
//! Chore definitions are kept as raw JSON values so that one bad chore does
//! not prevent the others from loading.

use chores_core::ChoreError;
use serde::Deserialize;
use std::path::Path;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub chores: Vec<serde_json::Value>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            listen: default_listen(),
            chores: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Parse a configuration document.
    pub fn parse(text: &str) -> Result<Self, ChoreError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ChoreError::Config(format!("Invalid TOML: {}", e)))?;
        if config.poll_interval_secs == 0 {
            return Err(ChoreError::config("poll_interval_secs must be at least 1"));
        }
        Ok(config)
    }

    /// Read and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ChoreError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            ChoreError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ChoreError::Config(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            ChoreError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = HostConfig::parse("").expect("empty config");
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert!(config.chores.is_empty());
    }

    #[test]
    fn chores_become_json_values() {
        let text = r#"
            poll_interval_secs = 30

            [[chores]]
            id = "feed_chickens"
            name = "Feed the chickens"
            trigger = { type = "daily", time = "06:00", gate = { entity_id = "binary_sensor.back_door", state = "on" } }
            completion = { type = "contact", entity_id = "binary_sensor.bin_lid" }
            reset = { type = "delay", minutes = 30 }
        "#;
        let config = HostConfig::parse(text).expect("valid config");
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.chores.len(), 1);
        assert_eq!(config.chores[0]["trigger"]["gate"]["state"], "on");
        assert_eq!(config.chores[0]["reset"]["minutes"], 30);
    }

    #[test]
    fn zero_interval_rejected() {
        let result = HostConfig::parse("poll_interval_secs = 0");
        assert!(matches!(result, Err(ChoreError::Config(_))));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let result = HostConfig::parse("chores = [");
        assert!(matches!(result, Err(ChoreError::Config(_))));
    }
}
