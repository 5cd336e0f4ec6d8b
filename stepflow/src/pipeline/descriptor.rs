//! Declarative pipeline descriptors.
//!
//! A pipeline names an ordered list of operations plus settings that shape
//! how the engine runs them. Descriptors are plain data and can be loaded
//! from JSON.

use crate::errors::StepflowError;
use crate::validation::Strictness;
use serde::{Deserialize, Serialize};

/// A reference to a registered operation, as one step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRef {
    /// The operation name.
    pub operation: String,
    /// Step parameters, passed to the cache key and visible in the plan.
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
    /// Whether a failure of this step fails the pipeline.
    #[serde(default = "default_critical")]
    pub critical: bool,
    /// Timeout override for this step only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

const fn default_critical() -> bool {
    true
}

impl StepRef {
    /// Creates a critical step with empty parameters.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: empty_params(),
            critical: true,
            timeout_ms: None,
        }
    }

    /// Sets the step parameters.
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Marks the step non-critical.
    #[must_use]
    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    /// Overrides the step timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

impl From<&str> for StepRef {
    fn from(operation: &str) -> Self {
        Self::new(operation)
    }
}

impl From<String> for StepRef {
    fn from(operation: String) -> Self {
        Self::new(operation)
    }
}

/// Settings that shape a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineSettings {
    /// Treat completed steps as restorable; enables rollback on failure.
    pub backup_before_run: bool,
    /// Run rollback hooks when a critical step fails.
    pub rollback_on_failure: bool,
    /// Advisory flag carried into the plan for handlers that support it.
    pub incremental_execution: bool,
    /// Allow independent consecutive steps to run concurrently.
    pub parallel_execution: bool,
    /// Default timeout for steps without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_timeout_ms: Option<u64>,
    /// Overall budget for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Validation strictness. Falls back to the engine default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strictness: Option<Strictness>,
}

impl PipelineSettings {
    /// Returns true if a failed run should roll back completed steps.
    #[must_use]
    pub fn rollback_enabled(&self) -> bool {
        self.backup_before_run || self.rollback_on_failure
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `StepflowError::InvalidSettings` for zero durations.
    pub fn validate(&self, owner: &str) -> Result<(), StepflowError> {
        if self.step_timeout_ms == Some(0) {
            return Err(StepflowError::invalid_settings(owner, "step_timeout_ms must be > 0"));
        }
        if self.deadline_ms == Some(0) {
            return Err(StepflowError::invalid_settings(owner, "deadline_ms must be > 0"));
        }
        Ok(())
    }
}

/// Pipeline-level requirements checked before any step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineValidation {
    /// Context keys the caller must supply.
    pub required_context_keys: Vec<String>,
    /// Tools that must be available, checked as collaborator names.
    pub required_tools: Vec<String>,
}

/// A named, ordered composition of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    /// The pipeline name.
    pub name: String,
    /// Free-form grouping.
    #[serde(default = "default_category")]
    pub category: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<StepRef>,
    /// Run settings.
    #[serde(default)]
    pub settings: PipelineSettings,
    /// Pipeline-level requirements.
    #[serde(default)]
    pub validation: PipelineValidation,
}

fn default_category() -> String {
    "general".to_string()
}

impl PipelineDescriptor {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: default_category(),
            description: String::new(),
            steps: Vec::new(),
            settings: PipelineSettings::default(),
            validation: PipelineValidation::default(),
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: impl Into<StepRef>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds required context keys.
    #[must_use]
    pub fn requires_context_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.validation
            .required_context_keys
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds required tools.
    #[must_use]
    pub fn requires_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.validation
            .required_tools
            .extend(tools.into_iter().map(Into::into));
        self
    }

    /// Step operation names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.operation.as_str()).collect()
    }
}
