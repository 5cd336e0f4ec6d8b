//! The validation gate: precondition checks before anything runs.
//!
//! Operations and pipelines declare the context keys and collaborators they
//! need. The gate compares those declarations against the current context and
//! the collaborator directory and rejects with every missing item listed.
//! It never mutates the context and never invokes a handler.

use crate::collaborators::CollaboratorDirectory;
use crate::context::ExecutionContext;
use crate::errors::StepflowError;
use crate::operations::OperationDescriptor;
use crate::pipeline::{ExecutionPlan, PipelineDescriptor, PlannedStep};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Something with declared preconditions.
pub trait Requirements {
    /// Name used in error messages.
    fn subject(&self) -> &str;

    /// Context keys that must be present.
    fn required_context_keys(&self) -> &[String];

    /// Collaborators that must be available.
    fn required_collaborators(&self) -> &[String];
}

impl Requirements for OperationDescriptor {
    fn subject(&self) -> &str {
        &self.name
    }

    fn required_context_keys(&self) -> &[String] {
        &self.required_context_keys
    }

    fn required_collaborators(&self) -> &[String] {
        &self.required_collaborators
    }
}

impl Requirements for PlannedStep {
    fn subject(&self) -> &str {
        self.name()
    }

    fn required_context_keys(&self) -> &[String] {
        &self.operation.required_context_keys
    }

    fn required_collaborators(&self) -> &[String] {
        &self.operation.required_collaborators
    }
}

impl Requirements for PipelineDescriptor {
    fn subject(&self) -> &str {
        &self.name
    }

    fn required_context_keys(&self) -> &[String] {
        &self.validation.required_context_keys
    }

    fn required_collaborators(&self) -> &[String] {
        &self.validation.required_tools
    }
}

impl Requirements for ExecutionPlan {
    fn subject(&self) -> &str {
        &self.pipeline
    }

    fn required_context_keys(&self) -> &[String] {
        &self.required_context_keys
    }

    fn required_collaborators(&self) -> &[String] {
        &self.required_tools
    }
}

/// When step-level requirements are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Every step is checked before the first one runs.
    #[default]
    Strict,
    /// Each step is checked just before it runs.
    Lenient,
}

/// Checks declared requirements against a context and a collaborator directory.
#[derive(Clone)]
pub struct ValidationGate {
    collaborators: Arc<dyn CollaboratorDirectory>,
}

impl ValidationGate {
    /// Creates a gate over a collaborator directory.
    #[must_use]
    pub fn new(collaborators: Arc<dyn CollaboratorDirectory>) -> Self {
        Self { collaborators }
    }

    /// Validates one subject against the context.
    ///
    /// Context keys are checked first; collaborators only once every key
    /// is present.
    ///
    /// # Errors
    ///
    /// Returns `MissingContextKey` or `MissingCollaborator` listing every
    /// missing item in declaration order.
    pub fn validate<R>(&self, subject: &R, ctx: &ExecutionContext) -> Result<(), StepflowError>
    where
        R: Requirements + ?Sized,
    {
        self.validate_with(subject, ctx, &HashSet::new())
    }

    /// Validates a plan.
    ///
    /// Pipeline-level requirements always come first. Under
    /// [`Strictness::Strict`] every step is then checked in order, with
    /// keys published by earlier steps counted as present. Under
    /// [`Strictness::Lenient`] step checks are left to the engine.
    ///
    /// # Errors
    ///
    /// Returns the first subject's validation error.
    pub fn validate_plan(
        &self,
        plan: &ExecutionPlan,
        ctx: &ExecutionContext,
    ) -> Result<(), StepflowError> {
        self.validate(plan, ctx)?;

        if plan.settings.strictness == Strictness::Lenient {
            return Ok(());
        }

        let mut published: HashSet<&str> = HashSet::new();
        for step in &plan.steps {
            self.validate_with(step, ctx, &published)?;
            published.extend(step.operation.provided_context_keys.iter().map(String::as_str));
        }

        debug!(pipeline = %plan.pipeline, steps = plan.len(), "Plan validated");
        Ok(())
    }

    fn validate_with<R>(
        &self,
        subject: &R,
        ctx: &ExecutionContext,
        published: &HashSet<&str>,
    ) -> Result<(), StepflowError>
    where
        R: Requirements + ?Sized,
    {
        let missing_keys: Vec<String> = ctx
            .missing_keys(subject.required_context_keys())
            .into_iter()
            .filter(|key| !published.contains(key.as_str()))
            .collect();
        if !missing_keys.is_empty() {
            warn!(subject = subject.subject(), missing = ?missing_keys, "Missing context keys");
            return Err(StepflowError::MissingContextKey {
                subject: subject.subject().to_string(),
                keys: missing_keys,
            });
        }

        let missing_collaborators: Vec<String> = subject
            .required_collaborators()
            .iter()
            .filter(|name| !self.collaborators.has_collaborator(name))
            .cloned()
            .collect();
        if !missing_collaborators.is_empty() {
            warn!(
                subject = subject.subject(),
                missing = ?missing_collaborators,
                "Missing collaborators"
            );
            return Err(StepflowError::MissingCollaborator {
                subject: subject.subject().to_string(),
                names: missing_collaborators,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for ValidationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MockCollaboratorDirectory, StaticCollaboratorDirectory};
    use crate::operations::OperationRegistry;
    use crate::pipeline::{PipelineComposer, PipelineSettings};
    use crate::testing::RecordingHandler;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn op(name: &str) -> OperationDescriptor {
        OperationDescriptor::new(name, Arc::new(RecordingHandler::new(name)))
    }

    fn gate(names: &[&str]) -> ValidationGate {
        ValidationGate::new(Arc::new(StaticCollaboratorDirectory::from_names(
            names.iter().copied(),
        )))
    }

    #[test]
    fn test_missing_collaborator() {
        let deploy = op("deploy").requires_collaborators(["docker"]);
        let err = gate(&["git"]).validate(&deploy, &ExecutionContext::new()).unwrap_err();

        assert_eq!(err.to_string(), "Missing collaborator: docker");
    }

    #[test]
    fn test_lists_every_missing_key() {
        let analyze = op("analyze").requires_context_keys(["project_path", "language", "depth"]);
        let ctx = ExecutionContext::new().with("language", json!("rust"));

        let err = gate(&[]).validate(&analyze, &ctx).unwrap_err();
        match err {
            StepflowError::MissingContextKey { subject, keys } => {
                assert_eq!(subject, "analyze");
                assert_eq!(keys, vec!["project_path", "depth"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_context_keys_checked_before_collaborators() {
        let build = op("build")
            .requires_context_keys(["project_path"])
            .requires_collaborators(["cargo"]);

        let err = gate(&[]).validate(&build, &ExecutionContext::new()).unwrap_err();
        assert!(matches!(err, StepflowError::MissingContextKey { .. }));
    }

    #[test]
    fn test_gate_consults_directory() {
        let mut directory = MockCollaboratorDirectory::new();
        directory
            .expect_has_collaborator()
            .times(2)
            .returning(|name| name == "git");

        let gate = ValidationGate::new(Arc::new(directory));
        let status = op("status").requires_collaborators(["git", "gh"]);

        let err = gate.validate(&status, &ExecutionContext::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing collaborator: gh");
    }

    #[test]
    fn test_validate_does_not_touch_context() {
        let ctx = ExecutionContext::new().with("a", json!(1));
        let before = ctx.clone();
        let _ = gate(&[]).validate(&op("x").requires_context_keys(["b"]), &ctx);
        assert_eq!(ctx, before);
    }

    fn composer() -> PipelineComposer {
        let registry = OperationRegistry::new();
        registry
            .register(op("analyze").requires_context_keys(["project_path"]).provides_context_keys(["analysis"]))
            .unwrap();
        registry
            .register(op("generate").requires_context_keys(["analysis"]))
            .unwrap();
        registry
            .register(op("deploy").requires_collaborators(["docker"]))
            .unwrap();
        PipelineComposer::new(Arc::new(registry))
    }

    #[test]
    fn test_plan_counts_published_keys() {
        let plan = composer()
            .compose(&PipelineDescriptor::new("tdd").step("analyze").step("generate"))
            .unwrap();
        let ctx = ExecutionContext::new().with("project_path", json!("/srv"));

        assert!(gate(&[]).validate_plan(&plan, &ctx).is_ok());
    }

    #[test]
    fn test_plan_strict_checks_later_steps_eagerly() {
        let plan = composer()
            .compose(&PipelineDescriptor::new("ship").step("analyze").step("deploy"))
            .unwrap();
        let ctx = ExecutionContext::new().with("project_path", json!("/srv"));

        let err = gate(&[]).validate_plan(&plan, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "Missing collaborator: docker");
    }

    #[test]
    fn test_plan_lenient_defers_step_checks() {
        let pipeline = PipelineDescriptor::new("ship")
            .step("analyze")
            .step("deploy")
            .with_settings(PipelineSettings {
                strictness: Some(Strictness::Lenient),
                ..Default::default()
            });
        let plan = composer().compose(&pipeline).unwrap();

        assert!(gate(&[]).validate_plan(&plan, &ExecutionContext::new()).is_ok());
    }

    #[test]
    fn test_plan_checks_pipeline_requirements_first() {
        let pipeline = PipelineDescriptor::new("ship")
            .step("deploy")
            .requires_tools(["kubectl"])
            .requires_context_keys(["cluster"]);
        let plan = composer().compose(&pipeline).unwrap();

        let err = gate(&[]).validate_plan(&plan, &ExecutionContext::new()).unwrap_err();
        assert_eq!(err.to_string(), "Missing context key: cluster");

        let ctx = ExecutionContext::new().with("cluster", json!("prod"));
        let err = gate(&["docker"]).validate_plan(&plan, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "Missing collaborator: kubectl");
    }

    #[test]
    fn test_pipeline_descriptor_requirements() {
        let pipeline = PipelineDescriptor::new("p").requires_tools(["docker"]);
        assert_eq!(pipeline.subject(), "p");
        assert_eq!(pipeline.required_collaborators(), &["docker".to_string()]);
    }

    #[test]
    fn test_strictness_serde() {
        assert_eq!(serde_json::to_value(Strictness::Lenient).unwrap(), json!("lenient"));
        assert_eq!(Strictness::default(), Strictness::Strict);
    }
}
