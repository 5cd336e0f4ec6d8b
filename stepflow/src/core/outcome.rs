//! The uniform result envelope produced by every operation and pipeline.

use crate::errors::{FailureInfo, StepflowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The outcome of an operation or pipeline execution.
///
/// Exactly one of `data`/`error` is meaningful, selected by `success`.
/// The constructors are the only supported way to build an `Outcome`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the execution succeeded.
    pub success: bool,

    /// Payload for successful executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message for failed executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Structured diagnostic detail for failed executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,

    /// When the outcome was produced.
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    /// Creates a successful outcome carrying a payload.
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a successful outcome with no payload.
    #[must_use]
    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a successful outcome with a single keyed value.
    #[must_use]
    pub fn ok_value(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(key.into(), value);
        Self::ok(serde_json::Value::Object(data))
    }

    /// Creates a failed outcome with a message.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            failure: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failed outcome from an engine error, keeping its structured detail.
    #[must_use]
    pub fn from_error(err: &StepflowError) -> Self {
        Self::fail(err.to_string()).with_failure(err.to_failure_info())
    }

    /// Attaches structured failure detail. Ignored on successful outcomes.
    #[must_use]
    pub fn with_failure(mut self, failure: FailureInfo) -> Self {
        if !self.success {
            self.failure = Some(failure);
        }
        self
    }

    /// Returns true if the outcome indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns true if the outcome indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// Returns the error message, if failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        if self.success {
            None
        } else {
            self.error.as_deref()
        }
    }

    /// Returns the error code from the failure detail, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.code.as_str())
    }

    /// Gets a keyed value from an object payload.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}

impl From<StepflowError> for Outcome {
    fn from(err: StepflowError) -> Self {
        Self::from_error(&err)
    }
}
