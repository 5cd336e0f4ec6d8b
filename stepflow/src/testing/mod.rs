//! Testing utilities for stepflow operations and pipelines.
//!
//! This module provides:
//! - Mock handlers and rollback hooks
//! - Assertions for outcomes and execution reports
//! - An engine fixture sharing registry, cache and collaborators

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_outcome_error, assert_outcome_failed, assert_outcome_succeeded,
    assert_outcome_value, assert_report_state, assert_steps_executed,
};
pub use fixtures::{context_with, EngineFixture};
pub use mocks::{
    FailingHandler, FaultingHandler, PanickingHandler, RecordingHandler, RecordingRollback,
    RollbackLog, SlowHandler,
};
