//! Store configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! stream_page_size = 256
//! token_expiration_metadata = true
//! verify_index_matches = true
//!
//! [prune]
//! stale_timeout = "5s"
//! batch_size = 128
//! detach_references = true
//! detach_timeout = "30s"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the entity stores.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Documents fetched per cursor page when streaming query results.
    pub stream_page_size: usize,

    /// Attach each token's expiration date to its document metadata,
    /// so stores with native expiration can drop it.
    pub token_expiration_metadata: bool,

    /// Re-check every index match against the loaded document before
    /// yielding it. Stale index entries then drop out instead of leaking
    /// documents whose indexed fields changed.
    pub verify_index_matches: bool,

    /// Token pruning.
    pub prune: PruneConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stream_page_size: 256,
            token_expiration_metadata: true,
            verify_index_matches: true,
            prune: PruneConfig::default(),
        }
    }
}

/// Token pruning configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Wait this long for `TokenIndex` to catch up before selecting tokens.
    /// `None` prunes against whatever the index holds.
    #[serde(with = "humantime_serde")]
    pub stale_timeout: Option<Duration>,

    /// Tokens deleted per store batch.
    pub batch_size: usize,

    /// Remove pruned token ids from their authorizations' `tokens` lists.
    pub detach_references: bool,

    /// Wait this long for `AuthorizationIndex` to catch up before detaching.
    /// Detaching always waits, since a lagging index would miss owners.
    #[serde(with = "humantime_serde")]
    pub detach_timeout: Duration,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            stale_timeout: None,
            batch_size: 128,
            detach_references: true,
            detach_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The TOML source could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration value: {0}")]
    Validation(String),
}

impl StoreConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Validation` for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if:
    /// - `stream_page_size` is zero
    /// - `prune.batch_size` is zero
    /// - `prune.stale_timeout` is zero
    /// - `prune.detach_timeout` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_page_size == 0 {
            return Err(ConfigError::Validation(
                "stream_page_size must be > 0".to_string(),
            ));
        }

        if self.prune.batch_size == 0 {
            return Err(ConfigError::Validation(
                "prune.batch_size must be > 0".to_string(),
            ));
        }

        if self.prune.stale_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Validation(
                "prune.stale_timeout must be > 0 when set".to_string(),
            ));
        }

        if self.prune.detach_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "prune.detach_timeout must be > 0".to_string(),
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
        let config = StoreConfig::default();
        assert_eq!(config.stream_page_size, 256);
        assert!(config.token_expiration_metadata);
        assert!(config.verify_index_matches);
        assert_eq!(config.prune.batch_size, 128);
        assert!(config.prune.detach_references);
        assert!(config.prune.stale_timeout.is_none());
        assert_eq!(config.prune.detach_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = StoreConfig::from_toml_str(
            r#"
            stream_page_size = 32
            token_expiration_metadata = false
            verify_index_matches = false

            [prune]
            stale_timeout = "5s"
            batch_size = 10
            detach_references = false
            detach_timeout = "2s"
            "#,
        )
        .unwrap();

        assert_eq!(config.stream_page_size, 32);
        assert!(!config.token_expiration_metadata);
        assert!(!config.verify_index_matches);
        assert_eq!(config.prune.stale_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.prune.batch_size, 10);
        assert!(!config.prune.detach_references);
        assert_eq!(config.prune.detach_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = StoreConfig::from_toml_str("[prune]\nstale_timeout = \"250ms\"\n").unwrap();
        assert_eq!(config.stream_page_size, 256);
        assert_eq!(config.prune.stale_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.prune.batch_size, 128);
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = StoreConfig::from_toml_str("stream_page_size = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = StoreConfig::from_toml_str("[prune]\nstale_timeout = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_sizes_fail_validation() {
        let err = StoreConfig::from_toml_str("stream_page_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("stream_page_size"));

        let mut config = StoreConfig::default();
        config.prune.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        config.prune.batch_size = 1;
        config.prune.stale_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        config.prune.stale_timeout = None;
        config.prune.detach_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_round_trip_through_toml() {
        let mut config = StoreConfig::default();
        config.prune.stale_timeout = Some(Duration::from_secs(2));
        let text = toml::to_string(&config).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }
}
