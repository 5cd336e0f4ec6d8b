//! # Stepflow
//!
//! An execution engine for named, registrable operations and the pipelines
//! composed from them.
//!
//! Stepflow provides:
//!
//! - **Operation registry**: handlers registered under unique names, with
//!   declared context keys, collaborators, timeouts and rollback hooks
//! - **Validation gate**: every missing precondition reported before any
//!   handler runs
//! - **Result cache**: TTL memoization of idempotent operations, with a
//!   background sweep
//! - **Pipeline composition**: declarative pipelines resolved into plans,
//!   optionally batched for parallel execution
//! - **Execution engine**: a per-run state machine with timeouts, deadlines,
//!   cancellation and reverse-order rollback
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepflow::prelude::*;
//!
//! let registry = Arc::new(OperationRegistry::new());
//! registry.register(
//!     OperationDescriptor::new("analyze", Arc::new(AnalyzeHandler))
//!         .requires_context_keys(["project_path"])
//!         .cacheable(30_000),
//! )?;
//!
//! let engine = Engine::new(registry, Arc::new(StaticCollaboratorDirectory::new()));
//! let pipeline = PipelineDescriptor::new("tdd").step("analyze");
//!
//! let mut ctx = ExecutionContext::new().with("project_path", json!("/srv/app"));
//! let report = engine
//!     .run_pipeline(&pipeline, &mut ctx, &CancellationToken::new())
//!     .await;
//! assert!(report.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cache;
pub mod cancellation;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observability;
pub mod operations;
pub mod pipeline;
pub mod testing;
pub mod utils;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{cache_key, CacheStats, ResultCache, SweeperHandle};
    pub use crate::cancellation::CancellationToken;
    pub use crate::collaborators::{CollaboratorDirectory, StaticCollaboratorDirectory};
    pub use crate::config::EngineConfig;
    pub use crate::context::ExecutionContext;
    pub use crate::core::{ExecutionState, Outcome};
    pub use crate::engine::{Engine, ExecutionReport, RollbackRecord, StepRecord};
    pub use crate::errors::{FailureInfo, StepflowError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::operations::{
        AsyncFnHandler, FnHandler, FnRollback, Handler, OperationDescriptor,
        OperationRegistry, OperationSettings, RollbackHook,
    };
    pub use crate::pipeline::{
        ExecutionPlan, PipelineCatalog, PipelineComposer, PipelineDescriptor,
        PipelineSettings, StepRef,
    };
    pub use crate::validation::{Strictness, ValidationGate};

    pub use async_trait::async_trait;
    pub use serde_json::json;
    pub use std::sync::Arc;
}
