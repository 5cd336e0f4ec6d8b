//! Cooperative cancellation for in-flight executions.
//!
//! The engine observes the token at step boundaries only; a handler that
//! has already started is allowed to finish or time out.

mod token;

pub use token::CancellationToken;
