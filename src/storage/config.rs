//! Configuration for cache storage backends

use crate::error::{HrcError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the cache root directory
pub const ENV_CACHE_DIR: &str = "HRC_CACHE_DIR";

/// Environment variable toggling atomic writes
pub const ENV_ATOMIC_WRITES: &str = "HRC_ATOMIC_WRITES";

/// Environment variable toggling metrics collection
pub const ENV_ENABLE_METRICS: &str = "HRC_ENABLE_METRICS";

/// Configuration for cache storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem backend
    pub cache_dir: PathBuf,

    /// Write to a temp file and rename it into place, so that concurrent
    /// readers never observe a partially written entry
    pub atomic_writes: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("hrc-cache"),
            atomic_writes: true,
            enable_metrics: true,
        }
    }
}

impl StorageConfig {
    /// Create a new builder for storage configuration
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }

    /// Load configuration from the environment (and a `.env` file if present).
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            cache_dir: std::env::var_os(ENV_CACHE_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            atomic_writes: env_flag(ENV_ATOMIC_WRITES)?.unwrap_or(defaults.atomic_writes),
            enable_metrics: env_flag(ENV_ENABLE_METRICS)?.unwrap_or(defaults.enable_metrics),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(HrcError::ConfigError(
                "cache_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value)
            .map(Some)
            .ok_or_else(|| HrcError::ConfigError(format!("{} must be a boolean, got '{}'", name, value))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for storage configuration
#[derive(Debug, Default)]
pub struct StorageConfigBuilder {
    cache_dir: Option<PathBuf>,
    atomic_writes: Option<bool>,
    enable_metrics: Option<bool>,
}

impl StorageConfigBuilder {
    /// Set the cache root directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Enable or disable write-temp-then-rename
    pub fn atomic_writes(mut self, enable: bool) -> Self {
        self.atomic_writes = Some(enable);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the storage configuration
    pub fn build(self) -> StorageConfig {
        let defaults = StorageConfig::default();

        StorageConfig {
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            atomic_writes: self.atomic_writes.unwrap_or(defaults.atomic_writes),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert!(config.atomic_writes);
        assert!(config.enable_metrics);
        assert!(config.cache_dir.ends_with("hrc-cache"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StorageConfig::builder()
            .cache_dir("/var/cache/hrc")
            .atomic_writes(false)
            .enable_metrics(false)
            .build();

        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/hrc"));
        assert!(!config.atomic_writes);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_config_validation() {
        let config = StorageConfig::builder().cache_dir("").build();
        assert!(config.validate().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
