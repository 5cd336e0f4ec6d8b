//! Execution context threaded through every step.
//!
//! A context is created per invocation, owned by exactly one in-flight
//! execution, and discarded once the aggregated outcome is produced.

mod execution;

pub use execution::ExecutionContext;
