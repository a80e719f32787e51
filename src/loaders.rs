//! Resource loading utilities
//!
//! This module reads schema documents from their locations and decodes them
//! into [`SchemaNode`]s.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::locations::Location;
use crate::node::SchemaNode;
use std::fs;

/// Resource loader for schema documents
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        match location {
            Location::Path(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Filesystem(format!("Failed to read file '{}': {}", path.display(), e))
                })?;

                self.limits.check_schema_size(content.len())?;

                Ok(content)
            }
            Location::Url(url) => Err(Error::Filesystem(format!(
                "Remote schema '{}' requested but remote resources are not supported",
                url
            ))),
            // in-memory documents are named, their content lives in a provider
            Location::String(name) => Err(Error::Filesystem(format!(
                "In-memory document '{}' has no loadable source",
                name
            ))),
        }
    }

    /// Load and decode a schema document
    pub fn load_node(&self, location: &Location) -> Result<SchemaNode> {
        let text = self.load(location)?;
        let content = serde_json::from_str(&text).map_err(|e| {
            Error::Filesystem(format!("Invalid JSON in '{}': {}", location, e))
        })?;
        Ok(SchemaNode::new(content, location.clone()))
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
