//! Core domain model types for stepflow.
//!
//! This module contains the fundamental types shared by every component:
//! - The uniform `Outcome` envelope
//! - The execution state machine states

mod outcome;
mod status;

pub use outcome::Outcome;
pub use status::ExecutionState;
