//! Model generation
//!
//! [`Generator`] processes every root schema a provider supplies, renders
//! each class of the finished model and writes one file per class below the
//! destination directory, following the class path.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::filters::FilterRegistry;
use crate::model::{ClassRef, GeneratedModel};
use crate::processor::SchemaProcessor;
use crate::provider::SchemaProvider;
use crate::render::Renderer;

/// Drives a full generation run
#[derive(Debug)]
pub struct Generator {
    config: GeneratorConfig,
    filters: FilterRegistry,
}

impl Generator {
    /// Create a generator with the built-in filters
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            filters: FilterRegistry::with_builtins(),
        }
    }

    /// Use a custom filter registry
    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Get the filter registry
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Build the model of every provided schema without rendering
    ///
    /// The first schema error aborts the run.
    pub fn build_model(&self, provider: &dyn SchemaProvider) -> Result<GeneratedModel> {
        let mut processor = SchemaProcessor::new(&self.config, &self.filters).with_provider(provider);
        for node in provider.schemas()? {
            self.config.limits.check_schema_size(node.content().to_string().len())?;
            let class = processor.process(&node)?;
            debug!(class = %class, origin = %node.origin(), "processed root schema");
        }
        processor.finish()
    }

    /// Generate, render and write every class
    pub fn generate(
        &self,
        provider: &dyn SchemaProvider,
        renderer: &dyn Renderer,
        destination: impl AsRef<Path>,
    ) -> Result<GenerationReport> {
        let destination = destination.as_ref();
        let model = self.build_model(provider)?;

        let mut rendered = Vec::with_capacity(model.len());
        for schema in model.classes() {
            rendered.push(renderer.render(schema, &model)?);
        }

        create_dir(destination)?;
        let mut report = GenerationReport::default();
        for class in rendered {
            let target = destination.join(&class.path);
            if let Some(parent) = target.parent() {
                create_dir(parent)?;
            }
            fs::write(&target, &class.content).map_err(|e| {
                Error::Filesystem(format!("Failed to write '{}': {}", target.display(), e))
            })?;

            if self.config.output_enabled {
                info!(class = %class.class, file = %target.display(), "rendered class");
            } else {
                debug!(class = %class.class, file = %target.display(), "rendered class");
            }
            report.classes.push(class.class);
            report.files.push(target);
        }

        info!(
            classes = report.class_count(),
            destination = %destination.display(),
            "generation finished"
        );
        Ok(report)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        Error::Filesystem(format!("Failed to create directory '{}': {}", path.display(), e))
    })
}

/// Result of a generation run
#[derive(Debug, Default, Clone)]
pub struct GenerationReport {
    /// Generated classes, in generation order
    pub classes: Vec<ClassRef>,
    /// Written files
    pub files: Vec<PathBuf>,
}

impl GenerationReport {
    /// Number of generated classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Number of written files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use crate::render::DumpRenderer;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_build_model() {
        let provider = MemoryProvider::new()
            .with_schema("person.json", json!({"properties": {"address": {"type": "object", "properties": {"street": {"type": "string"}}}}}));
        let model = Generator::default().build_model(&provider).unwrap();

        let names: Vec<_> = model.class_names().collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], "Person");
        assert!(names[1].starts_with("Person_Address"));
    }

    #[test]
    fn test_generate_writes_class_paths() {
        let dir = TempDir::new().unwrap();
        let provider = MemoryProvider::new().with_schema("person.json", json!({"properties": {"name": {"type": "string"}}}));
        let generator = Generator::new(GeneratorConfig::new().with_namespace_prefix("App.Models"));

        let report = generator
            .generate(&provider, &DumpRenderer::new(), dir.path())
            .unwrap();

        assert_eq!(report.class_count(), 1);
        assert_eq!(report.files, vec![dir.path().join("App/Models/Person.json")]);
        assert!(report.files[0].exists());
    }

    #[test]
    fn test_generate_aborts_on_schema_error() {
        let dir = TempDir::new().unwrap();
        let provider = MemoryProvider::new()
            .with_schema("bad.json", json!({"properties": {"x": {"type": "decimal"}}}));

        let err = Generator::default()
            .generate(&provider, &DumpRenderer::new(), dir.path().join("out"))
            .unwrap_err();
        assert!(err.is_schema());
        assert!(!dir.path().join("out").exists());
    }
}
