//! Error types for the stepflow engine.
//!
//! Every error carries a stable code so that failed outcomes can be
//! diagnosed without re-running the execution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The main error type for stepflow operations.
#[derive(Debug, Error)]
pub enum StepflowError {
    /// An operation with the same name is already registered.
    #[error("Duplicate operation: {name}")]
    DuplicateOperation {
        /// The operation name.
        name: String,
    },

    /// No operation is registered under this name.
    #[error("Unknown operation: {name}")]
    UnknownOperation {
        /// The operation name.
        name: String,
    },

    /// A pipeline with the same name is already in the catalog.
    #[error("Duplicate pipeline: {name}")]
    DuplicatePipeline {
        /// The pipeline name.
        name: String,
    },

    /// No pipeline is registered under this name.
    #[error("Unknown pipeline: {name}")]
    UnknownPipeline {
        /// The pipeline name.
        name: String,
    },

    /// The pipeline declares no steps.
    #[error("Pipeline '{pipeline}' has no steps")]
    EmptyPipeline {
        /// The pipeline name.
        pipeline: String,
    },

    /// Required context keys are absent.
    #[error("Missing context key: {}", keys.join(", "))]
    MissingContextKey {
        /// The subject (operation or pipeline) being validated.
        subject: String,
        /// Every missing key, in declaration order.
        keys: Vec<String>,
    },

    /// Required collaborators are not available.
    #[error("Missing collaborator: {}", names.join(", "))]
    MissingCollaborator {
        /// The subject (operation or pipeline) being validated.
        subject: String,
        /// Every missing collaborator, in declaration order.
        names: Vec<String>,
    },

    /// A step exceeded its time budget.
    #[error("Timeout")]
    Timeout {
        /// The step that timed out.
        step: String,
        /// The budget that was exceeded.
        timeout_ms: u64,
    },

    /// The execution was cancelled.
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// A handler raised a fault. The original message is preserved.
    #[error("{message}")]
    HandlerFault {
        /// The operation whose handler faulted.
        operation: String,
        /// The original fault message.
        message: String,
    },

    /// A step returned a failed outcome without structured detail.
    #[error("{message}")]
    StepFailed {
        /// The failing step.
        step: String,
        /// The step's error message.
        message: String,
    },

    /// Descriptor settings failed validation at registration time.
    #[error("Invalid settings for '{owner}': {message}")]
    InvalidSettings {
        /// The operation or pipeline owning the settings.
        owner: String,
        /// What is wrong.
        message: String,
    },

    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StepflowError {
    /// Creates a handler fault error.
    #[must_use]
    pub fn handler_fault(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFault {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid settings error.
    #[must_use]
    pub fn invalid_settings(owner: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            owner: owner.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateOperation { .. } => "REGISTRY-001-DUPLICATE",
            Self::UnknownOperation { .. } => "REGISTRY-002-UNKNOWN",
            Self::DuplicatePipeline { .. } => "CATALOG-001-DUPLICATE",
            Self::UnknownPipeline { .. } => "CATALOG-002-UNKNOWN",
            Self::EmptyPipeline { .. } => "COMPOSE-001-EMPTY",
            Self::MissingContextKey { .. } => "VALIDATION-001-CONTEXT_KEY",
            Self::MissingCollaborator { .. } => "VALIDATION-002-COLLABORATOR",
            Self::Timeout { .. } => "EXEC-001-TIMEOUT",
            Self::Cancelled { .. } => "EXEC-002-CANCELLED",
            Self::HandlerFault { .. } => "EXEC-003-HANDLER_FAULT",
            Self::StepFailed { .. } => "EXEC-004-STEP_FAILED",
            Self::InvalidSettings { .. } => "SETTINGS-001-INVALID",
            Self::Config(_) => "CONFIG-001-INVALID",
            Self::Serialization(_) => "IO-001-SERIALIZATION",
            Self::Io(_) => "IO-002-IO",
        }
    }

    /// Returns true for errors raised by the validation gate.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingContextKey { .. } | Self::MissingCollaborator { .. }
        )
    }

    /// Builds the structured failure detail for this error.
    #[must_use]
    pub fn to_failure_info(&self) -> FailureInfo {
        let mut info = FailureInfo::new(self.code(), self.to_string());
        match self {
            Self::MissingContextKey { subject, keys } => {
                info = info
                    .with_missing(keys.clone())
                    .with_context_entry("subject", subject.clone());
            }
            Self::MissingCollaborator { subject, names } => {
                info = info
                    .with_missing(names.clone())
                    .with_context_entry("subject", subject.clone());
            }
            Self::Timeout { step, timeout_ms } => {
                info = info
                    .with_step(step.clone())
                    .with_context_entry("timeout_ms", timeout_ms.to_string());
            }
            Self::HandlerFault { operation, .. } => {
                info = info.with_step(operation.clone());
            }
            Self::StepFailed { step, .. } => {
                info = info.with_step(step.clone());
            }
            Self::UnknownOperation { name } => {
                info = info.with_context_entry("operation", name.clone());
            }
            _ => {}
        }
        info
    }
}

/// Structured failure detail attached to failed outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FailureInfo {
    /// Error code (e.g., "VALIDATION-002-COLLABORATOR").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// The step that failed, if the failure is step-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Missing keys or collaborators for validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    /// Errors raised by rollback hooks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback_errors: Vec<String>,
    /// Additional context key-value pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl FailureInfo {
    /// Creates a new failure info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Sets the failing step.
    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Sets the missing names.
    #[must_use]
    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = missing;
        self
    }

    /// Sets the rollback errors.
    #[must_use]
    pub fn with_rollback_errors(mut self, errors: Vec<String>) -> Self {
        self.rollback_errors = errors;
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collaborator_message() {
        let err = StepflowError::MissingCollaborator {
            subject: "deploy".to_string(),
            names: vec!["docker".to_string()],
        };
        assert_eq!(err.to_string(), "Missing collaborator: docker");
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_context_key_lists_all() {
        let err = StepflowError::MissingContextKey {
            subject: "analyze".to_string(),
            keys: vec!["project_path".to_string(), "language".to_string()],
        };
        assert_eq!(err.to_string(), "Missing context key: project_path, language");

        let info = err.to_failure_info();
        assert_eq!(info.code, "VALIDATION-001-CONTEXT_KEY");
        assert_eq!(info.missing.len(), 2);
        assert_eq!(info.context.get("subject"), Some(&"analyze".to_string()));
    }

    #[test]
    fn test_timeout_message_and_detail() {
        let err = StepflowError::Timeout {
            step: "generate".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Timeout");

        let info = err.to_failure_info();
        assert_eq!(info.step.as_deref(), Some("generate"));
        assert_eq!(info.context.get("timeout_ms"), Some(&"5000".to_string()));
    }

    #[test]
    fn test_handler_fault_preserves_message() {
        let err = StepflowError::handler_fault("refactor", "disk full");
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.code(), "EXEC-003-HANDLER_FAULT");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_failure_info_serialization_skips_empty() {
        let info = FailureInfo::new("EXEC-001-TIMEOUT", "Timeout");
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["code"], "EXEC-001-TIMEOUT");
        assert!(json.get("missing").is_none());
        assert!(json.get("rollback_errors").is_none());
    }
}
