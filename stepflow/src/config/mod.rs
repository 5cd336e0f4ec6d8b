//! Engine configuration.
//!
//! Missing fields default to the values below, so a partial JSON document
//! (or none at all) yields a usable configuration.

use crate::errors::StepflowError;
use crate::validation::Strictness;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine-wide defaults and background task intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step timeout when neither the step, operation nor pipeline sets one.
    pub default_step_timeout_ms: u64,

    /// How often the cache sweeper purges expired entries.
    pub cache_sweep_interval_ms: u64,

    /// Budget for each rollback hook.
    pub rollback_timeout_ms: u64,

    /// Strictness for pipelines that do not choose one.
    pub strictness: Strictness,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_ms: 30_000,
            cache_sweep_interval_ms: 60_000,
            rollback_timeout_ms: 10_000,
            strictness: Strictness::Strict,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON or `Config` for invalid values.
    pub fn from_json_str(text: &str) -> Result<Self, StepflowError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from a JSON file.
    ///
    /// If the file is missing, returns `EngineConfig::default()`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file exists but cannot be read, otherwise as
    /// [`EngineConfig::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StepflowError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if any duration is zero.
    pub fn validate(&self) -> Result<(), StepflowError> {
        if self.default_step_timeout_ms == 0 {
            return Err(StepflowError::Config(
                "default_step_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.cache_sweep_interval_ms == 0 {
            return Err(StepflowError::Config(
                "cache_sweep_interval_ms must be > 0".to_string(),
            ));
        }
        if self.rollback_timeout_ms == 0 {
            return Err(StepflowError::Config(
                "rollback_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the default step timeout.
    #[must_use]
    pub fn with_default_step_timeout_ms(mut self, ms: u64) -> Self {
        self.default_step_timeout_ms = ms;
        self
    }

    /// Sets the rollback hook timeout.
    #[must_use]
    pub fn with_rollback_timeout_ms(mut self, ms: u64) -> Self {
        self.rollback_timeout_ms = ms;
        self
    }

    /// Sets the default strictness.
    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// The default step timeout as a duration.
    #[must_use]
    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_millis(self.default_step_timeout_ms)
    }

    /// The sweep interval as a duration.
    #[must_use]
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sweep_interval_ms)
    }

    /// The rollback hook timeout as a duration.
    #[must_use]
    pub fn rollback_timeout(&self) -> Duration {
        Duration::from_millis(self.rollback_timeout_ms)
    }
}
