//! Execution state machine states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of one pipeline or operation execution.
///
/// Legal transitions:
/// `Pending -> Validating -> Running -> (Completed | Failed | RolledBack)`
/// and `Validating -> Failed` when the validation gate rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Created, not yet started.
    #[default]
    Pending,
    /// Checking declared requirements.
    Validating,
    /// Executing steps.
    Running,
    /// All critical steps succeeded.
    Completed,
    /// Validation, a critical step, cancellation or the deadline failed the run.
    Failed,
    /// The run failed and at least one rollback hook ran.
    RolledBack,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Validating => write!(f, "validating"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

impl ExecutionState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::RolledBack)
    }

    /// Returns true if the state indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Validating)
                | (Self::Validating, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
                | (Self::Failed, Self::RolledBack)
        )
    }
}
