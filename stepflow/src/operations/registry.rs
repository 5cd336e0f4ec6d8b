//! The operation registry: name to descriptor lookup and the single dispatch point.

use super::OperationDescriptor;
use crate::context::ExecutionContext;
use crate::core::Outcome;
use crate::errors::StepflowError;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of operation descriptors.
///
/// Populated at startup and read-mostly afterwards. Construct one and share
/// it by `Arc` with every engine that dispatches through it.
#[derive(Default)]
pub struct OperationRegistry {
    operations: RwLock<HashMap<String, Arc<OperationDescriptor>>>,
}

impl OperationRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateOperation` if the name is taken, or
    /// `InvalidSettings` if the descriptor fails validation.
    pub fn register(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<Arc<OperationDescriptor>, StepflowError> {
        descriptor.validate()?;

        let mut operations = self.operations.write();
        if operations.contains_key(&descriptor.name) {
            return Err(StepflowError::DuplicateOperation {
                name: descriptor.name,
            });
        }

        info!(
            operation = %descriptor.name,
            category = %descriptor.category,
            version = %descriptor.version,
            cacheable = descriptor.settings.cacheable,
            "Registered operation"
        );

        let descriptor = Arc::new(descriptor);
        operations.insert(descriptor.name.clone(), descriptor.clone());
        Ok(descriptor)
    }

    /// Resolves an operation by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<OperationDescriptor>, StepflowError> {
        self.operations
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StepflowError::UnknownOperation {
                name: name.to_string(),
            })
    }

    /// Resolves and invokes an operation.
    ///
    /// Never fails: unknown names and handler faults come back as failed outcomes.
    pub async fn execute(&self, name: &str, ctx: &mut ExecutionContext) -> Outcome {
        match self.resolve(name) {
            Ok(descriptor) => invoke(&descriptor, ctx).await,
            Err(err) => Outcome::from_error(&err),
        }
    }

    /// Returns true if an operation is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.operations.read().contains_key(name)
    }

    /// Lists registered operation names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Lists operations in a category, sorted by name.
    #[must_use]
    pub fn by_category(&self, category: &str) -> Vec<Arc<OperationDescriptor>> {
        let mut found: Vec<_> = self
            .operations
            .read()
            .values()
            .filter(|d| d.category == category)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Returns the number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operation_count", &self.len())
            .finish()
    }
}

/// Invokes a descriptor's handler, converting faults into failed outcomes.
///
/// Both `Err` returns and panics become `HandlerFault` outcomes carrying
/// the original message.
pub async fn invoke(descriptor: &OperationDescriptor, ctx: &mut ExecutionContext) -> Outcome {
    debug!(operation = %descriptor.name, "Invoking handler");

    let result = AssertUnwindSafe(descriptor.handler.handle(ctx))
        .catch_unwind()
        .await;

    let message = match result {
        Ok(Ok(outcome)) => return outcome,
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => panic_message(payload.as_ref()),
    };

    warn!(operation = %descriptor.name, error = %message, "Handler fault");
    Outcome::from_error(&StepflowError::handler_fault(&descriptor.name, message))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::FnHandler;
    use crate::testing::{FaultingHandler, PanickingHandler, RecordingHandler};
    use serde_json::json;

    fn descriptor(name: &str) -> OperationDescriptor {
        OperationDescriptor::new(name, Arc::new(RecordingHandler::new(name)))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = OperationRegistry::new();
        registry.register(descriptor("analyze")).unwrap();

        assert!(registry.contains("analyze"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("analyze").unwrap().name, "analyze");
    }

    #[test]
    fn test_register_duplicate() {
        let registry = OperationRegistry::new();
        registry.register(descriptor("analyze")).unwrap();

        let err = registry.register(descriptor("analyze")).unwrap_err();
        assert!(matches!(err, StepflowError::DuplicateOperation { ref name } if name == "analyze"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_invalid_settings() {
        let registry = OperationRegistry::new();
        let err = registry
            .register(descriptor("slow").with_timeout_ms(0))
            .unwrap_err();

        assert!(matches!(err, StepflowError::InvalidSettings { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = OperationRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert_eq!(err.to_string(), "Unknown operation: missing");
    }

    #[test]
    fn test_names_and_categories() {
        let registry = OperationRegistry::new();
        registry.register(descriptor("b").with_category("analysis")).unwrap();
        registry.register(descriptor("a").with_category("analysis")).unwrap();
        registry.register(descriptor("c").with_category("generation")).unwrap();

        assert_eq!(registry.names(), vec!["a", "b", "c"]);
        let analysis: Vec<_> = registry
            .by_category("analysis")
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(analysis, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let registry = OperationRegistry::new();
        registry
            .register(OperationDescriptor::new(
                "status",
                Arc::new(FnHandler::new("status", |_ctx: &mut ExecutionContext| {
                    Ok(Outcome::ok_value("clean", json!(true)))
                })),
            ))
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let outcome = registry.execute("status", &mut ctx).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.get("clean"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_execute_unknown_is_outcome() {
        let registry = OperationRegistry::new();
        let mut ctx = ExecutionContext::new();

        let outcome = registry.execute("nope", &mut ctx).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.error_code(), Some("REGISTRY-002-UNKNOWN"));
    }

    #[test]
    fn test_execute_converts_error_fault() {
        let registry = OperationRegistry::new();
        registry
            .register(OperationDescriptor::new(
                "refactor",
                Arc::new(FaultingHandler::new("refactor", "parser crashed")),
            ))
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let outcome = tokio_test::block_on(registry.execute("refactor", &mut ctx));

        assert!(outcome.is_failure());
        assert_eq!(outcome.error_message(), Some("parser crashed"));
        assert_eq!(outcome.error_code(), Some("EXEC-003-HANDLER_FAULT"));
        assert_eq!(outcome.failure.unwrap().step.as_deref(), Some("refactor"));
    }

    #[tokio::test]
    async fn test_execute_converts_panic() {
        let registry = OperationRegistry::new();
        registry
            .register(OperationDescriptor::new(
                "explode",
                Arc::new(PanickingHandler::new("explode", "index out of range")),
            ))
            .unwrap();

        let mut ctx = ExecutionContext::new();
        let outcome = registry.execute("explode", &mut ctx).await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.error_message(), Some("index out of range"));
    }

    #[test]
    fn test_panic_message_fallback() {
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }
}
