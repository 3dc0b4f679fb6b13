//! Engine configuration
//!
//! Engine-wide settings loaded from TOML. Per-pipeline settings live in
//! [`PipelineConfig`](crate::types::PipelineConfig); the `defaults` table here
//! seeds them.
//!
//! ```toml
//! poll_interval_ms = 2000
//!
//! [defaults]
//! auto_retry = true
//! max_retries = 3
//! stage_timeout_secs = 300
//!
//! [retry]
//! base_delay_ms = 1000
//! max_delay_ms = 10000
//!
//! [completion]
//! max_tokens = 4096
//! temperature = 0.3
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Suggested status polling interval for presentation layers
    pub poll_interval_ms: u64,
    /// Defaults applied to new pipeline configs
    pub defaults: PipelineDefaults,
    /// Backoff settings
    pub retry: RetrySettings,
    /// Token/temperature policy sent with every completion request
    pub completion: CompletionSettings,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// See [`EngineConfig::from_toml_str`]; also `ConfigError::Io`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            return Err(ConfigError::Invalid(format!(
                "completion.temperature must be within [0, 2], got {}",
                self.completion.temperature
            )));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "completion.max_tokens must be positive".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.defaults.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "defaults.stage_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// With retry backoff settings
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, base: Duration, cap: Duration) -> Self {
        self.retry.base_delay_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.retry.max_delay_ms = u64::try_from(cap.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With completion policy
    #[inline]
    #[must_use]
    pub fn with_completion(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.completion.max_tokens = max_tokens;
        self.completion.temperature = temperature;
        self
    }

    /// Polling interval as a `Duration`
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            defaults: PipelineDefaults::default(),
            retry: RetrySettings::default(),
            completion: CompletionSettings::default(),
        }
    }
}

/// Defaults for new pipeline configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    pub auto_retry: bool,
    pub max_retries: u32,
    pub stage_timeout_secs: u64,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            auto_retry: true,
            max_retries: 3,
            stage_timeout_secs: 300,
        }
    }
}

/// Exponential backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Completion request policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.3,
        }
    }
}
