//! The execution engine.
//!
//! Runs single operations and whole pipelines against an execution context:
//! validates declared requirements, consults the result cache for cacheable
//! steps, bounds every step by its timeout and the pipeline deadline, and
//! rolls back completed steps when a critical step fails.

mod report;
mod rollback;

pub use report::{ExecutionReport, RollbackRecord, StepRecord};

use report::StateHistory;
use rollback::{rollback_errors, run_rollbacks, CompletedStep};

use crate::cache::{ResultCache, SweeperHandle};
use crate::cancellation::CancellationToken;
use crate::collaborators::CollaboratorDirectory;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::core::{ExecutionState, Outcome};
use crate::errors::StepflowError;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{pipeline_span, step_span};
use crate::operations::{invoke, OperationRegistry};
use crate::pipeline::{
    ExecutionPlan, PipelineCatalog, PipelineComposer, PipelineDescriptor, PlannedStep, StepRef,
};
use crate::utils::{duration_ms, new_execution_id};
use crate::validation::{Strictness, ValidationGate};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Runs operations and pipelines.
///
/// Cheap to share behind an `Arc`; every run owns its own context and
/// state, so concurrent runs are independent.
pub struct Engine {
    registry: Arc<OperationRegistry>,
    gate: ValidationGate,
    cache: Arc<ResultCache>,
    catalog: Arc<PipelineCatalog>,
    config: EngineConfig,
    events: Arc<dyn EventSink>,
}

impl Engine {
    /// Creates an engine with an empty cache and catalog, default
    /// configuration and no event sink.
    #[must_use]
    pub fn new(
        registry: Arc<OperationRegistry>,
        collaborators: Arc<dyn CollaboratorDirectory>,
    ) -> Self {
        Self {
            registry,
            gate: ValidationGate::new(collaborators),
            cache: Arc::new(ResultCache::new()),
            catalog: Arc::new(PipelineCatalog::new()),
            config: EngineConfig::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Uses a shared result cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Uses a pipeline catalog for [`Engine::run_named_pipeline`].
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<PipelineCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The operation registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// The result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// The pipeline catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<PipelineCatalog> {
        &self.catalog
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A composer using this engine's registry and defaults.
    #[must_use]
    pub fn composer(&self) -> PipelineComposer {
        PipelineComposer::new(self.registry.clone())
            .with_default_timeout(self.config.default_step_timeout())
            .with_default_strictness(self.config.strictness)
    }

    /// Starts the cache sweeper at the configured interval.
    #[must_use = "dropping the handle stops the sweeper"]
    pub fn spawn_cache_sweeper(&self) -> SweeperHandle {
        self.cache.spawn_sweeper(self.config.cache_sweep_interval())
    }

    /// Runs one operation through the validation gate, cache and timeout.
    ///
    /// Accepts a bare operation name or a [`StepRef`] carrying params and
    /// a timeout override. Never fails: every error is a failed outcome.
    pub async fn run_operation(
        &self,
        step: impl Into<StepRef>,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
    ) -> Outcome {
        let step = match self.composer().plan_step(0, &step.into(), None) {
            Ok(step) => step,
            Err(err) => return Outcome::from_error(&err),
        };

        if let Err(err) = self.gate.validate(&step, ctx) {
            self.emit_validation_failed(step.name(), &err).await;
            return Outcome::from_error(&err);
        }

        if let Some(cancelled) = cancelled_outcome(token) {
            return cancelled;
        }

        self.run_step(&step, ctx, None, 0, false).await.outcome
    }

    /// Runs a pipeline to completion and reports what happened.
    pub async fn run_pipeline(
        &self,
        pipeline: &PipelineDescriptor,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
    ) -> ExecutionReport {
        let execution_id = new_execution_id();
        let span = pipeline_span(&pipeline.name, &execution_id.to_string());
        self.run_pipeline_inner(pipeline, ctx, token, execution_id)
            .instrument(span)
            .await
    }

    /// Looks a pipeline up in the catalog and runs it.
    ///
    /// An unknown name yields a failed report without running anything.
    pub async fn run_named_pipeline(
        &self,
        name: &str,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
    ) -> ExecutionReport {
        match self.catalog.get(name) {
            Ok(pipeline) => self.run_pipeline(&pipeline, ctx, token).await,
            Err(err) => {
                let mut run = Run::start(new_execution_id(), name);
                run.history.transition(ExecutionState::Validating);
                run.history.transition(ExecutionState::Failed);
                self.finish(run, Outcome::from_error(&err)).await
            }
        }
    }

    async fn run_pipeline_inner(
        &self,
        pipeline: &PipelineDescriptor,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
        execution_id: Uuid,
    ) -> ExecutionReport {
        let mut run = Run::start(execution_id, &pipeline.name);
        info!(steps = pipeline.steps.len(), "Pipeline started");
        self.events
            .emit(
                events::PIPELINE_STARTED,
                Some(json!({
                    "pipeline": pipeline.name,
                    "execution_id": execution_id.to_string(),
                })),
            )
            .await;

        run.history.transition(ExecutionState::Validating);
        let plan = match self.prepare(pipeline, ctx) {
            Ok(plan) => plan,
            Err(err) => {
                if err.is_validation() {
                    self.emit_validation_failed(&pipeline.name, &err).await;
                }
                run.history.transition(ExecutionState::Failed);
                return self.finish(run, Outcome::from_error(&err)).await;
            }
        };

        run.history.transition(ExecutionState::Running);
        let outcome = self.run_plan(&plan, ctx, token, &mut run).await;
        self.finish(run, outcome).await
    }

    fn prepare(
        &self,
        pipeline: &PipelineDescriptor,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionPlan, StepflowError> {
        let plan = self.composer().compose(pipeline)?;
        self.gate.validate_plan(&plan, ctx)?;
        Ok(plan)
    }

    async fn run_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &mut ExecutionContext,
        token: &CancellationToken,
        run: &mut Run,
    ) -> Outcome {
        let deadline = plan.settings.deadline.map(|budget| Instant::now() + budget);
        let check_steps = plan.settings.strictness == Strictness::Lenient;
        let batches = plan.batches();

        let mut completed: Vec<CompletedStep> = Vec::new();
        let mut failure: Option<Outcome> = None;
        let mut ran = 0;

        for (batch_no, batch) in batches.iter().enumerate() {
            if let Some(cancelled) = cancelled_outcome(token) {
                warn!(reason = ?token.reason(), "Pipeline cancelled");
                run.history.transition(ExecutionState::Failed);
                return cancelled;
            }
            if deadline_passed(deadline) {
                break;
            }

            let records = if let [index] = batch.as_slice() {
                vec![
                    self.run_step(&plan.steps[*index], ctx, deadline, batch_no, check_steps)
                        .await,
                ]
            } else {
                self.run_batch(plan, batch, ctx, deadline, batch_no, check_steps)
                    .await
            };
            ran = batch_no + 1;

            for record in records {
                let step = &plan.steps[record.index];
                if record.succeeded() {
                    if let Some(hook) = &step.operation.rollback {
                        completed.push(CompletedStep {
                            step: record.step.clone(),
                            hook: hook.clone(),
                            outcome: record.outcome.clone(),
                        });
                    }
                } else if step.critical || deadline_passed(deadline) {
                    warn!(step = %record.step, error = ?record.outcome.error, "Step failed");
                    if failure.is_none() {
                        failure = Some(step_failure(&record));
                    }
                } else {
                    warn!(
                        step = %record.step,
                        error = ?record.outcome.error,
                        "Non-critical step failed, continuing"
                    );
                }
                run.steps.push(record);
            }

            if failure.is_some() {
                break;
            }
        }

        if let Some(budget) = plan.settings.deadline.filter(|_| deadline_passed(deadline)) {
            for (batch_no, batch) in batches.iter().enumerate().skip(ran) {
                for &index in batch {
                    let record = self.deadline_record(&plan.steps[index], batch_no, budget).await;
                    if failure.is_none() {
                        failure = Some(step_failure(&record));
                    }
                    run.steps.push(record);
                }
            }
        }

        let Some(mut outcome) = failure else {
            run.history.transition(ExecutionState::Completed);
            return Outcome::ok(serde_json::to_value(&run.steps).unwrap_or_default());
        };

        run.history.transition(ExecutionState::Failed);
        if plan.settings.rollback_enabled && !completed.is_empty() {
            info!(hooks = completed.len(), "Rolling back completed steps");
            let records = run_rollbacks(
                &completed,
                ctx,
                self.config.rollback_timeout(),
                self.events.as_ref(),
            )
            .await;
            if let Some(info) = outcome.failure.as_mut() {
                info.rollback_errors = rollback_errors(&records);
            }
            run.rollbacks = records;
            run.history.transition(ExecutionState::RolledBack);
        }
        outcome
    }

    /// Runs a batch on clones of the context and merges successful
    /// branches back in declared order.
    async fn run_batch(
        &self,
        plan: &ExecutionPlan,
        batch: &[usize],
        ctx: &mut ExecutionContext,
        deadline: Option<Instant>,
        batch_no: usize,
        check_requirements: bool,
    ) -> Vec<StepRecord> {
        debug!(batch = batch_no, size = batch.len(), "Running parallel batch");
        let base = ctx.clone();

        let runs = batch.iter().map(|&index| {
            let mut branch = base.clone();
            let step = &plan.steps[index];
            async move {
                let record = self
                    .run_step(step, &mut branch, deadline, batch_no, check_requirements)
                    .await;
                (record, branch)
            }
        });
        let results = futures::future::join_all(runs).await;

        results
            .into_iter()
            .map(|(record, branch)| {
                if record.succeeded() {
                    ctx.merge_changes(&base, branch);
                }
                record
            })
            .collect()
    }

    async fn run_step(
        &self,
        step: &PlannedStep,
        ctx: &mut ExecutionContext,
        deadline: Option<Instant>,
        batch: usize,
        check_requirements: bool,
    ) -> StepRecord {
        let span = step_span(step.name(), step.index);
        self.run_step_inner(step, ctx, deadline, batch, check_requirements)
            .instrument(span)
            .await
    }

    async fn run_step_inner(
        &self,
        step: &PlannedStep,
        ctx: &mut ExecutionContext,
        deadline: Option<Instant>,
        batch: usize,
        check_requirements: bool,
    ) -> StepRecord {
        let started = Instant::now();
        self.events
            .emit(
                events::STEP_STARTED,
                Some(json!({"step": step.name(), "index": step.index})),
            )
            .await;

        let (outcome, cached) = match check_requirements.then(|| self.gate.validate(step, ctx)) {
            Some(Err(err)) => {
                self.emit_validation_failed(step.name(), &err).await;
                (Outcome::from_error(&err), false)
            }
            _ => self.execute_step(step, ctx, deadline).await,
        };

        let record = StepRecord {
            step: step.name().to_string(),
            index: step.index,
            batch,
            critical: step.critical,
            cached,
            duration_ms: duration_ms(started.elapsed()),
            outcome,
        };
        self.emit_step_finished(&record).await;
        record
    }

    /// Invokes the handler, or answers from the cache for cacheable steps.
    async fn execute_step(
        &self,
        step: &PlannedStep,
        ctx: &mut ExecutionContext,
        deadline: Option<Instant>,
    ) -> (Outcome, bool) {
        let cache_params = step.cacheable().then(|| step.resolved_params(ctx));
        if let Some(params) = &cache_params {
            if let Some(hit) = self.cache.get(step.name(), params) {
                debug!(step = step.name(), "Served from cache");
                replay_published(step, &hit, ctx);
                return (hit, true);
            }
        }

        let budget = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return (timeout_outcome(step, Duration::ZERO), false);
                }
                step.timeout.min(remaining)
            }
            None => step.timeout,
        };

        let outcome = match tokio::time::timeout(budget, invoke(&step.operation, ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(step = step.name(), timeout_ms = duration_ms(budget), "Step timed out");
                timeout_outcome(step, budget)
            }
        };

        if let Some(params) = cache_params {
            if outcome.is_success() {
                self.cache
                    .set(step.name(), &params, outcome.clone(), step.cache_ttl());
            }
        }
        (outcome, false)
    }

    async fn deadline_record(
        &self,
        step: &PlannedStep,
        batch: usize,
        budget: Duration,
    ) -> StepRecord {
        let record = StepRecord {
            step: step.name().to_string(),
            index: step.index,
            batch,
            critical: step.critical,
            cached: false,
            duration_ms: 0,
            outcome: timeout_outcome(step, budget),
        };
        self.emit_step_finished(&record).await;
        record
    }

    async fn emit_step_finished(&self, record: &StepRecord) {
        let event = if !record.succeeded() {
            events::STEP_FAILED
        } else if record.cached {
            events::STEP_CACHED
        } else {
            events::STEP_COMPLETED
        };
        self.events
            .emit(
                event,
                Some(json!({
                    "step": record.step,
                    "index": record.index,
                    "cached": record.cached,
                    "duration_ms": record.duration_ms,
                    "error": record.outcome.error,
                })),
            )
            .await;
    }

    async fn emit_validation_failed(&self, subject: &str, err: &StepflowError) {
        self.events
            .emit(
                events::VALIDATION_FAILED,
                Some(json!({
                    "subject": subject,
                    "code": err.code(),
                    "error": err.to_string(),
                })),
            )
            .await;
    }

    async fn finish(&self, run: Run, outcome: Outcome) -> ExecutionReport {
        let report = run.into_report(outcome);
        let payload = json!({
            "pipeline": report.pipeline,
            "execution_id": report.execution_id.to_string(),
            "state": report.state,
            "duration_ms": report.duration_ms,
            "error": report.outcome.error,
        });

        if report.is_success() {
            info!(duration_ms = report.duration_ms, "Pipeline completed");
            self.events.emit(events::PIPELINE_COMPLETED, Some(payload)).await;
        } else {
            warn!(
                state = %report.state,
                error = ?report.outcome.error,
                duration_ms = report.duration_ms,
                "Pipeline failed"
            );
            self.events.emit(events::PIPELINE_FAILED, Some(payload)).await;
        }
        report
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("cache_entries", &self.cache.len())
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Mutable bookkeeping for one pipeline run.
struct Run {
    execution_id: Uuid,
    pipeline: String,
    history: StateHistory,
    steps: Vec<StepRecord>,
    rollbacks: Vec<RollbackRecord>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Run {
    fn start(execution_id: Uuid, pipeline: &str) -> Self {
        Self {
            execution_id,
            pipeline: pipeline.to_string(),
            history: StateHistory::new(),
            steps: Vec::new(),
            rollbacks: Vec::new(),
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn into_report(self, outcome: Outcome) -> ExecutionReport {
        let (state, history) = self.history.into_parts();
        ExecutionReport {
            execution_id: self.execution_id,
            pipeline: self.pipeline,
            state,
            history,
            outcome,
            steps: self.steps,
            rollbacks: self.rollbacks,
            started_at: self.started_at,
            duration_ms: duration_ms(self.clock.elapsed()),
        }
    }
}

fn cancelled_outcome(token: &CancellationToken) -> Option<Outcome> {
    token.is_cancelled().then(|| {
        Outcome::from_error(&StepflowError::Cancelled {
            reason: token.reason().unwrap_or_else(|| "cancelled".to_string()),
        })
    })
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn timeout_outcome(step: &PlannedStep, budget: Duration) -> Outcome {
    Outcome::from_error(&StepflowError::Timeout {
        step: step.name().to_string(),
        timeout_ms: duration_ms(budget),
    })
}

/// Builds the pipeline-level failure for a failed step, keeping the step's
/// own failure detail when it has one.
fn step_failure(record: &StepRecord) -> Outcome {
    let message = record
        .outcome
        .error_message()
        .unwrap_or("Step failed")
        .to_string();
    let mut info = record.outcome.failure.clone().unwrap_or_else(|| {
        StepflowError::StepFailed {
            step: record.step.clone(),
            message: message.clone(),
        }
        .to_failure_info()
    });
    if info.step.is_none() {
        info.step = Some(record.step.clone());
    }
    Outcome::fail(message).with_failure(info)
}

/// A cache hit skips the handler, so keys it would have published are
/// copied from the cached outcome's data instead.
fn replay_published(step: &PlannedStep, hit: &Outcome, ctx: &mut ExecutionContext) {
    let Some(data) = hit.data.as_ref() else {
        return;
    };
    for key in &step.operation.provided_context_keys {
        if let Some(value) = data.get(key) {
            ctx.insert(key.clone(), value.clone());
        }
    }
}
