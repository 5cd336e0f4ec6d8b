//! Test assertions for outcomes and execution reports.

use crate::core::{ExecutionState, Outcome};
use crate::engine::ExecutionReport;

/// Asserts that the outcome indicates success.
pub fn assert_outcome_succeeded(outcome: &Outcome) {
    assert!(
        outcome.is_success(),
        "Expected success, got error: {:?}",
        outcome.error
    );
}

/// Asserts that the outcome indicates failure.
pub fn assert_outcome_failed(outcome: &Outcome) {
    assert!(
        outcome.is_failure(),
        "Expected failure, got data: {:?}",
        outcome.data
    );
}

/// Asserts that the outcome failed with exactly `expected` as its message.
pub fn assert_outcome_error(outcome: &Outcome, expected: &str) {
    assert_outcome_failed(outcome);
    assert_eq!(
        outcome.error_message(),
        Some(expected),
        "Unexpected error message"
    );
}

/// Asserts that the outcome data contains a specific value.
pub fn assert_outcome_value(outcome: &Outcome, key: &str, expected: &serde_json::Value) {
    let actual = outcome.get(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected value {expected:?} for key '{key}', got {actual:?}"
    );
}

/// Asserts the final state of a report.
pub fn assert_report_state(report: &ExecutionReport, expected: ExecutionState) {
    assert_eq!(
        report.state, expected,
        "Expected state {expected:?}, got {:?} (error: {:?})",
        report.state, report.outcome.error
    );
}

/// Asserts the names of the steps a report recorded, in order.
pub fn assert_steps_executed(report: &ExecutionReport, expected: &[&str]) {
    let actual: Vec<&str> = report.steps.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected step sequence");
}
