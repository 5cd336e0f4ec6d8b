//! Execution plans: a composed pipeline with every setting resolved.

use crate::context::ExecutionContext;
use crate::operations::OperationDescriptor;
use crate::validation::Strictness;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// One step of an execution plan.
#[derive(Debug, Clone)]
pub struct PlannedStep {
    /// Position in the pipeline.
    pub index: usize,
    /// The resolved operation.
    pub operation: Arc<OperationDescriptor>,
    /// Step parameters.
    pub params: serde_json::Value,
    /// Whether a failure of this step fails the pipeline.
    pub critical: bool,
    /// Resolved timeout.
    pub timeout: Duration,
}

impl PlannedStep {
    /// The operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.operation.name
    }

    /// Whether results of this step may be served from the cache.
    #[must_use]
    pub fn cacheable(&self) -> bool {
        self.operation.settings.cacheable
    }

    /// Cache TTL, as declared by the operation.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.operation.settings.cache_ttl()
    }

    /// Parameters the cache key is derived from: the step params plus
    /// the values of every context key the operation requires.
    #[must_use]
    pub fn resolved_params(&self, ctx: &ExecutionContext) -> serde_json::Value {
        serde_json::json!({
            "params": self.params,
            "context": ctx.project(&self.operation.required_context_keys),
        })
    }
}

/// Pipeline settings after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSettings {
    /// Run rollback hooks when a critical step fails.
    pub rollback_enabled: bool,
    /// Advisory incremental flag.
    pub incremental_execution: bool,
    /// Whether independent steps are batched.
    pub parallel_execution: bool,
    /// Overall budget for the run.
    pub deadline: Option<Duration>,
    /// Validation strictness.
    pub strictness: Strictness,
}

/// A composed pipeline, ready to validate and run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// The pipeline name.
    pub pipeline: String,
    /// Pipeline-level required context keys.
    pub required_context_keys: Vec<String>,
    /// Pipeline-level required tools.
    pub required_tools: Vec<String>,
    /// Steps in declared order.
    pub steps: Vec<PlannedStep>,
    /// Resolved settings.
    pub settings: PlanSettings,
    batches: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        pipeline: String,
        required_context_keys: Vec<String>,
        required_tools: Vec<String>,
        steps: Vec<PlannedStep>,
        settings: PlanSettings,
    ) -> Self {
        let batches = schedule(&steps, settings.parallel_execution);
        Self {
            pipeline,
            required_context_keys,
            required_tools,
            steps,
            settings,
            batches,
        }
    }

    /// The batch schedule, as step indices. Sequential plans have one
    /// step per batch.
    #[must_use]
    pub fn batches(&self) -> &[Vec<usize>] {
        &self.batches
    }

    /// Step operation names, in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(PlannedStep::name).collect()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Groups consecutive steps into batches.
///
/// A step joins the open batch only if neither it nor any member declares a
/// rollback hook and its context footprint is disjoint from the batch's.
fn schedule(steps: &[PlannedStep], parallel: bool) -> Vec<Vec<usize>> {
    if !parallel {
        return steps.iter().map(|s| vec![s.index]).collect();
    }

    let mut batches: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut footprint: HashSet<&str> = HashSet::new();
    let mut current_has_rollback = false;

    for step in steps {
        let has_rollback = step.operation.has_rollback();
        let keys: Vec<&str> = step.operation.context_footprint().collect();
        let disjoint = keys.iter().all(|k| !footprint.contains(k));

        let joins = !current.is_empty() && !has_rollback && !current_has_rollback && disjoint;
        if !joins && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            footprint.clear();
        }

        current.push(step.index);
        footprint.extend(keys);
        current_has_rollback = has_rollback;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::FnRollback;
    use crate::testing::RecordingHandler;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn step(index: usize, descriptor: OperationDescriptor) -> PlannedStep {
        PlannedStep {
            index,
            operation: Arc::new(descriptor),
            params: json!({}),
            critical: true,
            timeout: Duration::from_secs(30),
        }
    }

    fn op(name: &str) -> OperationDescriptor {
        OperationDescriptor::new(name, Arc::new(RecordingHandler::new(name)))
    }

    fn settings(parallel: bool) -> PlanSettings {
        PlanSettings {
            rollback_enabled: false,
            incremental_execution: false,
            parallel_execution: parallel,
            deadline: None,
            strictness: Strictness::Strict,
        }
    }

    fn plan(steps: Vec<PlannedStep>, parallel: bool) -> ExecutionPlan {
        ExecutionPlan::new("p".into(), vec![], vec![], steps, settings(parallel))
    }

    #[test]
    fn test_sequential_schedule() {
        let plan = plan(vec![step(0, op("a")), step(1, op("b"))], false);
        assert_eq!(plan.batches(), &[vec![0], vec![1]]);
    }

    #[test]
    fn test_disjoint_steps_batch_together() {
        let plan = plan(
            vec![
                step(0, op("lint").requires_context_keys(["src"]).provides_context_keys(["lint_report"])),
                step(1, op("audit").requires_context_keys(["lockfile"])),
                step(2, op("summary").requires_context_keys(["lint_report"])),
            ],
            true,
        );
        assert_eq!(plan.batches(), &[vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_rollback_steps_run_alone() {
        let hook = Arc::new(FnRollback::new("undo", |_: &ExecutionContext, _: &crate::core::Outcome| Ok(())));
        let plan = plan(
            vec![
                step(0, op("a")),
                step(1, op("write").with_rollback(hook)),
                step(2, op("b")),
                step(3, op("c")),
            ],
            true,
        );
        assert_eq!(plan.batches(), &[vec![0], vec![1], vec![2, 3]]);
    }

    #[test]
    fn test_resolved_params_include_required_context() {
        let planned = step(0, op("generate").requires_context_keys(["project_path", "language"]));
        let ctx = ExecutionContext::new()
            .with("project_path", json!("/srv"))
            .with("unrelated", json!(1));

        assert_eq!(
            planned.resolved_params(&ctx),
            json!({"params": {}, "context": {"project_path": "/srv", "language": null}})
        );
    }
}
