//! Test fixtures for engine testing.

use std::sync::Arc;

use crate::cache::ResultCache;
use crate::collaborators::StaticCollaboratorDirectory;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::engine::Engine;
use crate::errors::StepflowError;
use crate::events::CollectingEventSink;
use crate::operations::{OperationDescriptor, OperationRegistry};

use super::RecordingHandler;

/// Bundles the shared pieces an engine is built from.
///
/// Every engine built by one fixture shares its registry, cache,
/// collaborators and event sink, so state carries over between runs.
#[derive(Debug)]
pub struct EngineFixture {
    /// Operation registry.
    pub registry: Arc<OperationRegistry>,
    /// Available collaborators.
    pub collaborators: Arc<StaticCollaboratorDirectory>,
    /// Result cache.
    pub cache: Arc<ResultCache>,
    /// Captured lifecycle events.
    pub events: Arc<CollectingEventSink>,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFixture {
    /// Creates an empty fixture with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(OperationRegistry::new()),
            collaborators: Arc::new(StaticCollaboratorDirectory::new()),
            cache: Arc::new(ResultCache::new()),
            events: Arc::new(CollectingEventSink::new()),
            config: EngineConfig::default(),
        }
    }

    /// Marks collaborators available.
    #[must_use]
    pub fn with_collaborators(self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            self.collaborators.add(name);
        }
        self
    }

    /// Replaces the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an operation.
    pub fn register(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<Arc<OperationDescriptor>, StepflowError> {
        self.registry.register(descriptor)
    }

    /// Registers a recording handler under `name`, shaped by `configure`.
    pub fn register_recording<F>(
        &self,
        name: &str,
        configure: F,
    ) -> Result<Arc<RecordingHandler>, StepflowError>
    where
        F: FnOnce(OperationDescriptor) -> OperationDescriptor,
    {
        self.register_handler(Arc::new(RecordingHandler::new(name)), name, configure)
    }

    /// Registers a prepared recording handler under `name`.
    pub fn register_handler<F>(
        &self,
        handler: Arc<RecordingHandler>,
        name: &str,
        configure: F,
    ) -> Result<Arc<RecordingHandler>, StepflowError>
    where
        F: FnOnce(OperationDescriptor) -> OperationDescriptor,
    {
        self.registry
            .register(configure(OperationDescriptor::new(name, handler.clone())))?;
        Ok(handler)
    }

    /// Builds an engine over the shared pieces.
    #[must_use]
    pub fn engine(&self) -> Engine {
        Engine::new(self.registry.clone(), self.collaborators.clone())
            .with_cache(self.cache.clone())
            .with_config(self.config.clone())
            .with_event_sink(self.events.clone())
    }
}

/// Builds a context from key/value pairs.
#[must_use]
pub fn context_with<'a>(
    entries: impl IntoIterator<Item = (&'a str, serde_json::Value)>,
) -> ExecutionContext {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fixture_registers_recording_handlers() {
        let fixture = EngineFixture::new().with_collaborators(["git"]);
        let handler = fixture
            .register_recording("status", |d| d.requires_collaborators(["git"]))
            .unwrap();

        assert_eq!(handler.name(), "status");
        assert!(fixture.registry.contains("status"));
        assert_eq!(fixture.collaborators.names(), vec!["git"]);
    }

    #[test]
    fn test_context_with() {
        let ctx = context_with([("project_path", json!("/srv/app")), ("language", json!("rust"))]);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get_str("language"), Some("rust"));
    }
}
