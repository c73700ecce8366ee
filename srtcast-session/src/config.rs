//! Configuration file support for streaming clients

use crate::connection::parse_target;
use serde::{Deserialize, Serialize};
use srtcast_transport::SrtMode;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid connection URI: {0}")]
    InvalidUri(String),
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection target (`srt://host:port?options`)
    pub uri: String,
    /// Connection role
    #[serde(default = "default_mode")]
    pub mode: SrtMode,
    /// Statistics sampling interval in milliseconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_ms: u64,
}

fn default_mode() -> SrtMode {
    SrtMode::Caller
}

fn default_stats_interval() -> u64 {
    1000
}

impl ClientConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Check the configuration against the same URI rules `open` applies
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_target(&self.uri).map_err(|_| ConfigError::InvalidUri(self.uri.clone()))?;
        Ok(())
    }

    /// Statistics sampling interval as a duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }
}
