//! Operations: the named, independently registrable units of work.
//!
//! This module provides:
//! - The `Handler` and `RollbackHook` contracts
//! - Closure adapters for both
//! - Immutable operation descriptors with typed settings
//! - The process-wide operation registry

mod descriptor;
mod handler;
mod registry;

pub use descriptor::{OperationDescriptor, OperationSettings};
pub use handler::{AsyncFnHandler, FnHandler, FnRollback, Handler, RollbackHook};
pub use registry::{invoke, OperationRegistry};
pub(crate) use registry::panic_message;
