//! Roler configuration
//!
//! Supports YAML configuration files

use serde::{Deserialize, Serialize};

/// Roler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolerConfig {
    /// This node's stable identifier; must be unique per live node
    #[serde(default = "default_local_address")]
    pub local_address: String,
    /// Replica fan-out per shard
    #[serde(default = "default_num_replicas")]
    pub num_replicas: usize,
}

impl Default for RolerConfig {
    fn default() -> Self {
        Self {
            local_address: default_local_address(),
            num_replicas: default_num_replicas(),
        }
    }
}

impl RolerConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Default value functions

fn default_local_address() -> String {
    "node1".to_string()
}

fn default_num_replicas() -> usize {
    0
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}
