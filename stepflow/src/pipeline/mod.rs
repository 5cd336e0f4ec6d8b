//! Pipeline definition and composition.
//!
//! This module provides:
//! - Declarative pipeline descriptors and step references
//! - A catalog of named pipelines
//! - The composer that resolves steps into an execution plan
//! - The plan itself, including the parallel batch schedule

mod catalog;
mod composer;
mod descriptor;
mod plan;

pub use catalog::PipelineCatalog;
pub use composer::PipelineComposer;
pub use descriptor::{PipelineDescriptor, PipelineSettings, PipelineValidation, StepRef};
pub use plan::{ExecutionPlan, PlanSettings, PlannedStep};
