//! Turns pipeline descriptors into execution plans.

use super::{ExecutionPlan, PipelineDescriptor, PlanSettings, PlannedStep, StepRef};
use crate::errors::StepflowError;
use crate::operations::OperationRegistry;
use crate::validation::Strictness;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Resolves pipeline steps against the registry.
#[derive(Debug, Clone)]
pub struct PipelineComposer {
    registry: Arc<OperationRegistry>,
    default_step_timeout: Duration,
    default_strictness: Strictness,
}

impl PipelineComposer {
    /// Default step timeout when nothing else sets one (30 seconds).
    pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a composer with default fallbacks.
    #[must_use]
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self {
            registry,
            default_step_timeout: Self::DEFAULT_STEP_TIMEOUT,
            default_strictness: Strictness::default(),
        }
    }

    /// Sets the engine-wide step timeout fallback.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    /// Sets the strictness used when a pipeline does not choose one.
    #[must_use]
    pub fn with_default_strictness(mut self, strictness: Strictness) -> Self {
        self.default_strictness = strictness;
        self
    }

    /// Composes a pipeline into an execution plan.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPipeline` if there are no steps, `InvalidSettings` for
    /// bad pipeline settings, or `UnknownOperation` for the first step whose
    /// operation is not registered.
    pub fn compose(&self, pipeline: &PipelineDescriptor) -> Result<ExecutionPlan, StepflowError> {
        if pipeline.steps.is_empty() {
            return Err(StepflowError::EmptyPipeline {
                pipeline: pipeline.name.clone(),
            });
        }
        pipeline.settings.validate(&pipeline.name)?;

        let pipeline_timeout = pipeline.settings.step_timeout_ms.map(Duration::from_millis);
        let steps = pipeline
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| self.plan_step(index, step, pipeline_timeout))
            .collect::<Result<Vec<_>, _>>()?;

        let settings = PlanSettings {
            rollback_enabled: pipeline.settings.rollback_enabled(),
            incremental_execution: pipeline.settings.incremental_execution,
            parallel_execution: pipeline.settings.parallel_execution,
            deadline: pipeline.settings.deadline_ms.map(Duration::from_millis),
            strictness: pipeline.settings.strictness.unwrap_or(self.default_strictness),
        };

        let plan = ExecutionPlan::new(
            pipeline.name.clone(),
            pipeline.validation.required_context_keys.clone(),
            pipeline.validation.required_tools.clone(),
            steps,
            settings,
        );

        debug!(
            pipeline = %plan.pipeline,
            steps = plan.len(),
            batches = plan.batches().len(),
            "Composed execution plan"
        );
        Ok(plan)
    }

    /// Resolves a single step.
    ///
    /// Timeout precedence: step override, then the operation's own setting,
    /// then `pipeline_timeout`, then the engine default.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` or `InvalidSettings` for a zero override.
    pub fn plan_step(
        &self,
        index: usize,
        step: &StepRef,
        pipeline_timeout: Option<Duration>,
    ) -> Result<PlannedStep, StepflowError> {
        let operation = self.registry.resolve(&step.operation)?;
        if step.timeout_ms == Some(0) {
            return Err(StepflowError::invalid_settings(
                &step.operation,
                "step timeout_ms must be > 0",
            ));
        }

        let timeout = step
            .timeout_ms
            .map(Duration::from_millis)
            .or_else(|| operation.settings.timeout())
            .or(pipeline_timeout)
            .unwrap_or(self.default_step_timeout);

        Ok(PlannedStep {
            index,
            operation,
            params: step.params.clone(),
            critical: step.critical,
            timeout,
        })
    }

    /// The strictness used when a pipeline does not choose one.
    #[must_use]
    pub fn default_strictness(&self) -> Strictness {
        self.default_strictness
    }
}
