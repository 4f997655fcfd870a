use crate::variant::FailurePolicy;
use bibcrawl_source::FetchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings that may come from the config file. CLI flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalSettings {
    /// Maximum frontier IDs per batch
    pub batch_size: usize,
    /// Checkpoint every time this many nodes (or works) have been processed
    pub checkpoint_every: u64,
    /// Pause after each batch, on top of the per-request pacing
    pub batch_delay_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            checkpoint_every: 500,
            batch_delay_ms: 200,
            failure_policy: FailurePolicy::Drop,
        }
    }
}

impl TraversalSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Whole-file configuration, e.g.
///
/// ```toml
/// [fetch]
/// mailto = "me@example.org"
/// paging = "offset"
///
/// [traversal]
/// batch_size = 50
/// failure_policy = { policy = "requeue", max_attempts = 3 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub traversal: TraversalSettings,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.traversal.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "traversal.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.traversal.checkpoint_every == 0 {
            return Err(ConfigError::Invalid(
                "traversal.checkpoint_every must be greater than 0".to_string(),
            ));
        }
        if let FailurePolicy::Requeue { max_attempts: 0 } = self.traversal.failure_policy {
            return Err(ConfigError::Invalid(
                "traversal.failure_policy.max_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
