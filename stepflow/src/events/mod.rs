//! Lifecycle events emitted by the engine.
//!
//! The engine reports pipeline, step, cache and rollback transitions to an
//! [`EventSink`]. Sinks are observers only; they cannot affect a run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A pipeline run started.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A pipeline run completed successfully.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// A pipeline run failed.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// Validation rejected a pipeline or operation.
pub const VALIDATION_FAILED: &str = "validation.failed";
/// A step started.
pub const STEP_STARTED: &str = "step.started";
/// A step completed successfully.
pub const STEP_COMPLETED: &str = "step.completed";
/// A step failed.
pub const STEP_FAILED: &str = "step.failed";
/// A step was served from the result cache.
pub const STEP_CACHED: &str = "step.cached";
/// A rollback hook ran.
pub const ROLLBACK_EXECUTED: &str = "rollback.executed";
