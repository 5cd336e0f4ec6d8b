//! Operation descriptors and their typed settings.

use super::{Handler, RollbackHook};
use crate::errors::StepflowError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Typed per-operation settings, validated once at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationSettings {
    /// Per-invocation timeout. Falls back to pipeline and engine defaults.
    pub timeout_ms: Option<u64>,
    /// Whether the handler is idempotent and its results may be memoized.
    pub cacheable: bool,
    /// How long a cached result stays valid.
    pub cache_ttl_ms: u64,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            cacheable: false,
            cache_ttl_ms: Self::DEFAULT_CACHE_TTL_MS,
        }
    }
}

impl OperationSettings {
    /// Default cache TTL (30 seconds).
    pub const DEFAULT_CACHE_TTL_MS: u64 = 30_000;

    /// Returns the timeout as a duration, if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Returns the cache TTL as a duration.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `StepflowError::InvalidSettings` for a zero timeout or a
    /// cacheable operation with a zero TTL.
    pub fn validate(&self, owner: &str) -> Result<(), StepflowError> {
        if self.timeout_ms == Some(0) {
            return Err(StepflowError::invalid_settings(owner, "timeout_ms must be > 0"));
        }
        if self.cacheable && self.cache_ttl_ms == 0 {
            return Err(StepflowError::invalid_settings(
                owner,
                "cache_ttl_ms must be > 0 for cacheable operations",
            ));
        }
        Ok(())
    }
}

/// Immutable description of a registered operation.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// The unique name of the operation.
    pub name: String,
    /// Free-form grouping, e.g. "analysis" or "refactoring".
    pub category: String,
    /// Version string.
    pub version: String,
    /// Collaborators the handler needs, in declaration order.
    pub required_collaborators: Vec<String>,
    /// Context keys the caller must supply, in declaration order.
    pub required_context_keys: Vec<String>,
    /// Context keys the handler publishes for later steps.
    pub provided_context_keys: Vec<String>,
    /// Typed settings.
    pub settings: OperationSettings,
    /// The handler implementation.
    pub handler: Arc<dyn Handler>,
    /// Optional compensating action.
    pub rollback: Option<Arc<dyn RollbackHook>>,
}

impl OperationDescriptor {
    /// Creates a new descriptor with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: name.into(),
            category: "general".to_string(),
            version: "1.0.0".to_string(),
            required_collaborators: Vec::new(),
            required_context_keys: Vec::new(),
            provided_context_keys: Vec::new(),
            settings: OperationSettings::default(),
            handler,
            rollback: None,
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds required collaborators.
    #[must_use]
    pub fn requires_collaborators(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        for name in names {
            push_unique(&mut self.required_collaborators, name.into());
        }
        self
    }

    /// Adds required context keys.
    #[must_use]
    pub fn requires_context_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for key in keys {
            push_unique(&mut self.required_context_keys, key.into());
        }
        self
    }

    /// Adds context keys the handler publishes.
    #[must_use]
    pub fn provides_context_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for key in keys {
            push_unique(&mut self.provided_context_keys, key.into());
        }
        self
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: OperationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.timeout_ms = Some(timeout_ms);
        self
    }

    /// Marks the operation cacheable with the given TTL.
    #[must_use]
    pub fn cacheable(mut self, ttl_ms: u64) -> Self {
        self.settings.cacheable = true;
        self.settings.cache_ttl_ms = ttl_ms;
        self
    }

    /// Sets the rollback hook.
    #[must_use]
    pub fn with_rollback(mut self, hook: Arc<dyn RollbackHook>) -> Self {
        self.rollback = Some(hook);
        self
    }

    /// Returns true if a rollback hook is declared.
    #[must_use]
    pub fn has_rollback(&self) -> bool {
        self.rollback.is_some()
    }

    /// Every context key the operation touches, required or provided.
    pub fn context_footprint(&self) -> impl Iterator<Item = &str> {
        self.required_context_keys
            .iter()
            .chain(&self.provided_context_keys)
            .map(String::as_str)
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or the settings are invalid.
    pub fn validate(&self) -> Result<(), StepflowError> {
        if self.name.trim().is_empty() {
            return Err(StepflowError::invalid_settings(
                &self.name,
                "operation name cannot be empty or whitespace-only",
            ));
        }
        self.settings.validate(&self.name)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHandler;

    fn handler() -> Arc<dyn Handler> {
        Arc::new(RecordingHandler::new("op"))
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = OperationDescriptor::new("generate", handler())
            .with_category("generation")
            .with_version("2.1.0")
            .requires_collaborators(["testGenerator", "codeAnalyzer", "testGenerator"])
            .requires_context_keys(["project_path"])
            .provides_context_keys(["generated_tests"])
            .cacheable(30_000);

        assert_eq!(desc.category, "generation");
        assert_eq!(desc.version, "2.1.0");
        assert_eq!(desc.required_collaborators, vec!["testGenerator", "codeAnalyzer"]);
        assert!(desc.settings.cacheable);
        assert_eq!(desc.settings.cache_ttl(), Duration::from_millis(30_000));
        assert!(!desc.has_rollback());
        assert_eq!(
            desc.context_footprint().collect::<Vec<_>>(),
            vec!["project_path", "generated_tests"]
        );
    }

    #[test]
    fn test_settings_defaults() {
        let settings = OperationSettings::default();
        assert_eq!(settings.timeout_ms, None);
        assert!(!settings.cacheable);
        assert_eq!(settings.cache_ttl_ms, OperationSettings::DEFAULT_CACHE_TTL_MS);
        assert!(settings.validate("x").is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let zero_timeout = OperationSettings {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            zero_timeout.validate("x"),
            Err(StepflowError::InvalidSettings { .. })
        ));

        let zero_ttl = OperationSettings {
            cacheable: true,
            cache_ttl_ms: 0,
            ..Default::default()
        };
        assert!(zero_ttl.validate("x").is_err());
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: OperationSettings =
            serde_json::from_value(serde_json::json!({"cacheable": true})).unwrap();
        assert!(settings.cacheable);
        assert_eq!(settings.cache_ttl_ms, 30_000);
    }

    #[test]
    fn test_blank_name_rejected() {
        let desc = OperationDescriptor::new("  ", handler());
        assert!(desc.validate().is_err());
    }
}
