//! Limits and constraints for schema processing
//!
//! This module defines limits that turn pathological inputs (deeply
//! mutually-recursive references, huge schema files, class explosions)
//! into reported errors instead of stack exhaustion or runaway output.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
    /// Maximum nesting depth of property factory recursion
    pub max_resolution_depth: usize,

    /// Maximum schema file size in bytes
    pub max_schema_size: usize,

    /// Maximum number of classes generated in one run
    pub max_classes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_resolution_depth: 256,
            max_schema_size: 10 * 1024 * 1024, // 10 MB
            max_classes: 10000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_resolution_depth: 32,
            max_schema_size: 1024 * 1024, // 1 MB
            max_classes: 500,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_resolution_depth: 2048,
            max_schema_size: 256 * 1024 * 1024, // 256 MB
            max_classes: 1000000,
        }
    }

    /// Check if resolution depth is within limits
    pub fn check_resolution_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_resolution_depth {
            Err(Error::LimitExceeded(format!(
                "Resolution depth {} exceeds maximum {}",
                depth, self.max_resolution_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if schema size is within limits
    pub fn check_schema_size(&self, size: usize) -> Result<()> {
        if size > self.max_schema_size {
            Err(Error::LimitExceeded(format!(
                "Schema size {} bytes exceeds maximum {} bytes",
                size, self.max_schema_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if number of generated classes is within limits
    pub fn check_classes(&self, count: usize) -> Result<()> {
        if count > self.max_classes {
            Err(Error::LimitExceeded(format!(
                "Class count {} exceeds maximum {}",
                count, self.max_classes
            )))
        } else {
            Ok(())
        }
    }
}
