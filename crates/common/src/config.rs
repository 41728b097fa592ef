//! Runtime configuration.
//!
//! Loaded from a TOML file; every section has defaults so a missing file
//! yields a usable (paper-trading) configuration.

use std::collections::HashMap;
use std::path::Path;

use model::RiskLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "TRADING_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Behavior of `publish` when the event buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Refuse immediately.
    FailFast,
    /// Yield and retry a bounded number of times before refusing.
    Retry,
}

/// Event processor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Ring buffer slot count (usable capacity is one less).
    pub event_buffer_size: usize,
    /// What `publish` does when the buffer is full.
    pub publish_policy: PublishPolicy,
    /// Retry attempts under [`PublishPolicy::Retry`].
    pub publish_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            event_buffer_size: 1024,
            publish_policy: PublishPolicy::Retry,
            publish_retries: 64,
        }
    }
}

/// Per-strategy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategySettings {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub exchanges: Vec<String>,
}

/// Per-exchange endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeEndpoints {
    #[serde(default)]
    pub rest_endpoint: String,
    #[serde(default)]
    pub ws_endpoint: String,
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub strategies: HashMap<String, StrategySettings>,
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeEndpoints>,
}

impl RuntimeConfig {
    /// Load configuration from the path in `TRADING_CONFIG`, falling back
    /// to `config/default.toml`, falling back to defaults when no file
    /// exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(path = %path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Strategy settings by name, defaulting to empty.
    pub fn strategy(&self, name: &str) -> StrategySettings {
        self.strategies.get(name).cloned().unwrap_or_default()
    }
}
