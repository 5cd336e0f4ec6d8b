//! Execution reports: what happened during one run.

use crate::core::{ExecutionState, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// The record of one executed (or timed-out) step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The operation name.
    pub step: String,
    /// Position in the pipeline.
    pub index: usize,
    /// Batch the step ran in.
    pub batch: usize,
    /// Whether the step was critical.
    pub critical: bool,
    /// Whether the outcome came from the result cache.
    pub cached: bool,
    /// Wall time spent on the step.
    pub duration_ms: u64,
    /// The step outcome.
    pub outcome: Outcome,
}

impl StepRecord {
    /// Returns true if the step succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_success()
    }
}

/// The record of one rollback hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// The step that was rolled back.
    pub step: String,
    /// Whether the hook completed without error.
    pub success: bool,
    /// The hook's error, panic message or "Timeout".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent in the hook.
    pub duration_ms: u64,
}

/// The aggregated result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Unique, time-ordered id of this run.
    pub execution_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Final state.
    pub state: ExecutionState,
    /// Every state the run passed through, starting with `Pending`.
    pub history: Vec<ExecutionState>,
    /// The aggregated outcome. On success, `data` is the list of step records.
    pub outcome: Outcome,
    /// Step records in completion order.
    pub steps: Vec<StepRecord>,
    /// Rollback records in invocation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollbacks: Vec<RollbackRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total wall time.
    pub duration_ms: u64,
}

impl ExecutionReport {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// Finds the record of a step by operation name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == name)
    }

    /// Records of every failed step, critical or not.
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| !s.succeeded())
    }

    /// Number of steps served from the cache.
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.steps.iter().filter(|s| s.cached).count()
    }

    /// Converts the report into JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Tracks the current state and the path taken to reach it.
#[derive(Debug, Clone)]
pub(crate) struct StateHistory {
    state: ExecutionState,
    history: Vec<ExecutionState>,
}

impl StateHistory {
    pub(crate) fn new() -> Self {
        Self {
            state: ExecutionState::Pending,
            history: vec![ExecutionState::Pending],
        }
    }

    pub(crate) fn transition(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.history.push(next);
    }

    pub(crate) fn into_parts(self) -> (ExecutionState, Vec<ExecutionState>) {
        (self.state, self.history)
    }
}
