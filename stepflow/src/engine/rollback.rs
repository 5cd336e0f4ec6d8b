//! Best-effort compensation of completed steps.

use super::RollbackRecord;
use crate::context::ExecutionContext;
use crate::core::Outcome;
use crate::events::{EventSink, ROLLBACK_EXECUTED};
use crate::operations::{panic_message, RollbackHook};
use crate::utils::duration_ms;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// A step that completed and declared a rollback hook.
#[derive(Debug, Clone)]
pub(crate) struct CompletedStep {
    pub(crate) step: String,
    pub(crate) hook: Arc<dyn RollbackHook>,
    pub(crate) outcome: Outcome,
}

/// Runs hooks in reverse completion order.
///
/// Every hook runs regardless of earlier hook errors, panics or timeouts;
/// each is recorded.
pub(crate) async fn run_rollbacks(
    completed: &[CompletedStep],
    ctx: &ExecutionContext,
    timeout: Duration,
    events: &dyn EventSink,
) -> Vec<RollbackRecord> {
    let mut records = Vec::with_capacity(completed.len());

    for entry in completed.iter().rev() {
        let started = Instant::now();
        let result = tokio::time::timeout(
            timeout,
            AssertUnwindSafe(entry.hook.rollback(ctx, &entry.outcome)).catch_unwind(),
        )
        .await;

        let error = match result {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(err))) => Some(format!("{err:#}")),
            Ok(Err(payload)) => Some(panic_message(payload.as_ref())),
            Err(_) => Some("Timeout".to_string()),
        };

        let record = RollbackRecord {
            step: entry.step.clone(),
            success: error.is_none(),
            error,
            duration_ms: duration_ms(started.elapsed()),
        };

        match &record.error {
            None => info!(step = %record.step, "Rolled back step"),
            Some(error) => warn!(step = %record.step, error = %error, "Rollback hook failed"),
        }

        events
            .emit(
                ROLLBACK_EXECUTED,
                Some(serde_json::json!({
                    "step": record.step,
                    "success": record.success,
                    "error": record.error,
                })),
            )
            .await;

        records.push(record);
    }

    records
}

/// Formats failed rollback records as `"<step>: <error>"`.
pub(crate) fn rollback_errors(records: &[RollbackRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.error.as_ref().map(|e| format!("{}: {e}", r.step)))
        .collect()
}
