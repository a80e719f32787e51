//! Generator configuration
//!
//! [`GeneratorConfig`] collects every knob that changes the produced model.
//! It can be built in code with the `with_*` methods or read from a JSON
//! file whose keys are the camelCase field names:
//!
//! ```json
//! {"namespacePrefix": "App.Model", "immutable": true, "limits": {"maxResolutionDepth": 64}}
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::limits::Limits;

/// Options for one generation run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Dot-separated namespace prepended to every class path
    pub namespace_prefix: String,
    /// Render classes without setters
    pub immutable: bool,
    /// Optional properties accept `null` without running their validators
    pub implicit_null: bool,
    /// Absent optional arrays become `[]`
    pub default_arrays_to_empty: bool,
    /// Report every failure instead of the first one
    pub collect_errors: bool,
    /// Log progress at info level
    pub output_enabled: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self {
            namespace_prefix: String::new(),
            immutable: false,
            implicit_null: true,
            default_arrays_to_empty: false,
            collect_errors: false,
            output_enabled: false,
            limits: Limits::default(),
        }
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Filesystem(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Filesystem(format!("Invalid config '{}': {}", path.display(), e))
        })
    }

    /// Set the namespace prefix
    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    /// Set whether classes are immutable
    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Set implicit null handling
    pub fn with_implicit_null(mut self, implicit_null: bool) -> Self {
        self.implicit_null = implicit_null;
        self
    }

    /// Set whether absent optional arrays default to empty
    pub fn with_default_arrays_to_empty(mut self, enabled: bool) -> Self {
        self.default_arrays_to_empty = enabled;
        self
    }

    /// Set error collection
    pub fn with_collect_errors(mut self, collect: bool) -> Self {
        self.collect_errors = collect;
        self
    }

    /// Set progress output
    pub fn with_output_enabled(mut self, enabled: bool) -> Self {
        self.output_enabled = enabled;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Namespace prefix split into class path segments
    pub fn namespace_segments(&self) -> Vec<String> {
        self.namespace_prefix
            .split(['.', '\\', '/'])
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert!(config.implicit_null);
        assert!(!config.collect_errors);
        assert!(config.namespace_segments().is_empty());
    }

    #[test]
    fn test_namespace_segments() {
        let config = GeneratorConfig::new().with_namespace_prefix("App.Model");
        assert_eq!(config.namespace_segments(), vec!["App", "Model"]);
        let config = GeneratorConfig::new().with_namespace_prefix("App\\Model\\");
        assert_eq!(config.namespace_segments(), vec!["App", "Model"]);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"namespacePrefix": "App", "collectErrors": true, "limits": {{"maxResolutionDepth": 12}}}}"#
        )
        .unwrap();

        let config = GeneratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.namespace_prefix, "App");
        assert!(config.collect_errors);
        assert!(config.implicit_null);
        assert_eq!(config.limits.max_resolution_depth, 12);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            GeneratorConfig::from_file(file.path()),
            Err(Error::Filesystem(_))
        ));
    }
}
