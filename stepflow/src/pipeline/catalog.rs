//! Named pipeline definitions, loadable from JSON.

use super::PipelineDescriptor;
use crate::errors::StepflowError;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    pipelines: Vec<PipelineDescriptor>,
}

/// Registry of pipeline descriptors, keyed by name.
#[derive(Debug, Default)]
pub struct PipelineCatalog {
    pipelines: RwLock<BTreeMap<String, Arc<PipelineDescriptor>>>,
}

impl PipelineCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from a JSON document of the form
    /// `{"pipelines": [ ... ]}`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed JSON, or the first
    /// registration error.
    pub fn from_json_str(text: &str) -> Result<Self, StepflowError> {
        let document: CatalogDocument = serde_json::from_str(text)?;
        let catalog = Self::new();
        for pipeline in document.pipelines {
            catalog.register(pipeline)?;
        }
        Ok(catalog)
    }

    /// Loads a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`PipelineCatalog::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StepflowError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json_str(&text)?;
        info!(
            path = %path.as_ref().display(),
            pipelines = catalog.len(),
            "Loaded pipeline catalog"
        );
        Ok(catalog)
    }

    /// Adds a pipeline.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePipeline` if the name is taken, or
    /// `InvalidSettings` if its settings fail validation.
    pub fn register(
        &self,
        pipeline: PipelineDescriptor,
    ) -> Result<Arc<PipelineDescriptor>, StepflowError> {
        pipeline.settings.validate(&pipeline.name)?;

        let mut pipelines = self.pipelines.write();
        if pipelines.contains_key(&pipeline.name) {
            return Err(StepflowError::DuplicatePipeline {
                name: pipeline.name,
            });
        }

        let pipeline = Arc::new(pipeline);
        pipelines.insert(pipeline.name.clone(), pipeline.clone());
        Ok(pipeline)
    }

    /// Looks up a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPipeline` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<PipelineDescriptor>, StepflowError> {
        self.pipelines
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StepflowError::UnknownPipeline {
                name: name.to_string(),
            })
    }

    /// Lists pipeline names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.pipelines.read().keys().cloned().collect()
    }

    /// Returns the number of pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOCUMENT: &str = r#"{
        "pipelines": [
            {
                "name": "tdd",
                "category": "testing",
                "steps": [
                    {"operation": "analyze"},
                    {"operation": "generate", "params": {"style": "unit"}}
                ],
                "validation": {"required_context_keys": ["project_path"]}
            },
            {
                "name": "deploy",
                "steps": [{"operation": "build"}],
                "settings": {"backup_before_run": true},
                "validation": {"required_tools": ["docker"]}
            }
        ]
    }"#;

    #[test]
    fn test_from_json_str() {
        let catalog = PipelineCatalog::from_json_str(DOCUMENT).unwrap();
        assert_eq!(catalog.names(), vec!["deploy", "tdd"]);

        let tdd = catalog.get("tdd").unwrap();
        assert_eq!(tdd.step_names(), vec!["analyze", "generate"]);
        assert_eq!(tdd.validation.required_context_keys, vec!["project_path"]);

        let deploy = catalog.get("deploy").unwrap();
        assert!(deploy.settings.backup_before_run);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOCUMENT.as_bytes()).unwrap();

        let catalog = PipelineCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineCatalog::from_file("/nonexistent/pipelines.json").unwrap_err();
        assert_eq!(err.code(), "IO-002-IO");
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let catalog = PipelineCatalog::new();
        catalog.register(PipelineDescriptor::new("tdd").step("analyze")).unwrap();

        let err = catalog.register(PipelineDescriptor::new("tdd")).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate pipeline: tdd");

        let err = catalog.get("release").unwrap_err();
        assert_eq!(err.to_string(), "Unknown pipeline: release");
    }

    #[test]
    fn test_malformed_document() {
        let err = PipelineCatalog::from_json_str("{\"pipelines\": [{}]}").unwrap_err();
        assert_eq!(err.code(), "IO-001-SERIALIZATION");
    }
}
