//! Combined configuration surface.
//!
//! [`ResilienceConfig`] groups the breaker and retry settings so they can be
//! loaded from a single TOML or JSON document. Durations are written as
//! integer milliseconds; missing fields take their defaults.
//!
//! ```rust
//! use callguard::config::ResilienceConfig;
//! use std::time::Duration;
//!
//! let config = ResilienceConfig::from_toml_str(
//!     r#"
//!     [breaker]
//!     failure_threshold = 5
//!
//!     [retry]
//!     max_attempts = 4
//!     base_delay = 500
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.breaker.failure_threshold, 5);
//! assert_eq!(config.breaker.reset_timeout, Duration::from_secs(30));
//! assert_eq!(config.retry.base_delay, Duration::from_millis(500));
//! ```

use crate::circuit_breaker::BreakerConfig;
use crate::core::{ConfigError, ConfigResult};
use crate::retry::RetryConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Breaker and retry settings for one protected endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,
    /// Retry settings.
    pub retry: RetryConfig,
}

impl ResilienceConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the breaker settings.
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets the retry settings.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks both sections.
    pub fn validate(&self) -> ConfigResult<()> {
        self.breaker.validate()?;
        self.retry.validate()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a file, choosing the format by extension (`.json`, else TOML).
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };

        tracing::debug!(
            path = %path.display(),
            failure_threshold = config.breaker.failure_threshold,
            max_attempts = config.retry.max_attempts,
            "Resilience configuration loaded"
        );
        Ok(config)
    }
}
