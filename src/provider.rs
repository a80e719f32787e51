//! Schema providers
//!
//! A [`SchemaProvider`] supplies the root schema documents of a run and
//! fetches documents named by cross-file `$ref`s. The processor only talks
//! to it through the reference resolver.

use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::loaders::Loader;
use crate::locations::Location;
use crate::node::SchemaNode;

/// Source of schema documents
pub trait SchemaProvider {
    /// Every root document, in a deterministic order
    fn schemas(&self) -> Result<Vec<SchemaNode>>;

    /// Directory class paths are derived from, if any
    fn base_path(&self) -> Option<&Path>;

    /// Location a reference names, relative to the referring document
    fn locate(&self, reference: &str, origin: &Location) -> Result<Location> {
        origin.join(reference)
    }

    /// Decode the document a reference names
    fn fetch(&self, reference: &str, origin: &Location) -> Result<SchemaNode>;
}

/// Every `*.json` file below a directory
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    loader: Loader,
}

impl DirectoryProvider {
    /// Create a provider for a directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Filesystem(format!(
                "Schema source '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            loader: Loader::new(),
        })
    }

    /// Use a custom loader
    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Paths of all schema files, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }
}

impl SchemaProvider for DirectoryProvider {
    fn schemas(&self) -> Result<Vec<SchemaNode>> {
        let files = self.files();
        debug!(root = %self.root.display(), files = files.len(), "discovered schema files");
        files
            .into_iter()
            .map(|path| self.loader.load_node(&Location::Path(path)))
            .collect()
    }

    fn base_path(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn fetch(&self, reference: &str, origin: &Location) -> Result<SchemaNode> {
        let location = self.locate(reference, origin)?;
        self.loader.load_node(&location)
    }
}

/// In-memory documents keyed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    documents: IndexMap<String, Value>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document
    pub fn with_schema(mut self, name: impl Into<String>, content: Value) -> Self {
        self.documents.insert(name.into(), content);
        self
    }

    /// Add a document
    pub fn add_schema(&mut self, name: impl Into<String>, content: Value) {
        self.documents.insert(name.into(), content);
    }
}

impl SchemaProvider for MemoryProvider {
    fn schemas(&self) -> Result<Vec<SchemaNode>> {
        Ok(self
            .documents
            .iter()
            .map(|(name, content)| SchemaNode::new(content.clone(), Location::String(name.clone())))
            .collect())
    }

    fn base_path(&self) -> Option<&Path> {
        None
    }

    fn locate(&self, reference: &str, _origin: &Location) -> Result<Location> {
        let name = reference.trim_start_matches("./");
        Ok(Location::String(name.to_string()))
    }

    fn fetch(&self, reference: &str, origin: &Location) -> Result<SchemaNode> {
        let location = self.locate(reference, origin)?;
        let name = location.as_str();
        self.documents
            .get(&name)
            .map(|content| SchemaNode::new(content.clone(), location.clone()))
            .ok_or_else(|| Error::Filesystem(format!("Unknown schema document '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_provider_discovers_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"type": "object"}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"type": "object"}"#).unwrap();
        fs::write(dir.path().join("nested/c.json"), r#"{"type": "object"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let provider = DirectoryProvider::new(dir.path()).unwrap();
        let stems: Vec<_> = provider
            .schemas()
            .unwrap()
            .iter()
            .filter_map(|n| n.origin().file_stem())
            .collect();
        assert_eq!(stems, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_directory_provider_fetch_relative() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("common.json"), r#"{"definitions": {}}"#).unwrap();
        let provider = DirectoryProvider::new(dir.path()).unwrap();

        let origin = Location::Path(dir.path().join("person.json"));
        let node = provider.fetch("common.json", &origin).unwrap();
        assert!(node.has("definitions"));
    }

    #[test]
    fn test_directory_provider_rejects_missing_dir() {
        assert!(matches!(
            DirectoryProvider::new("/definitely/not/here"),
            Err(Error::Filesystem(_))
        ));
    }

    #[test]
    fn test_memory_provider() {
        let provider = MemoryProvider::new().with_schema("common.json", json!({"type": "string"}));
        let node = provider
            .fetch("./common.json", &Location::String("person.json".into()))
            .unwrap();
        assert_eq!(node.origin(), &Location::String("common.json".into()));
        assert!(provider.fetch("other.json", &Location::String("x".into())).is_err());
    }
}
