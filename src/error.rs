//! Error types for jsonschema-modelgen
//!
//! This module defines all error types used throughout the library.
//! Schema errors abort the generation of the current root schema; validation
//! errors are only produced by the reference evaluator in [`crate::instance`].

use std::fmt;
use thiserror::Error;

/// Result type alias using the modelgen Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modelgen operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported schema
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Invalid filter registration or filter configuration
    #[error("filter error: {0}")]
    Filter(String),

    /// The renderer failed to produce output for a resolved class
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// Unreadable source or unwritable destination
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// Instance data rejected by a generated class
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Several instance failures collected in one pass
    #[error("validation errors: {0}")]
    ValidationErrors(ValidationErrors),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a bare schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(SchemaError::new(message))
    }

    /// Check whether this error is a schema error
    pub fn is_schema(&self) -> bool {
        matches!(self, Error::Schema(_))
    }
}

/// Schema building error with context
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// Error message
    pub message: String,
    /// Origin file and JSON pointer of the offending node
    pub location: Option<String>,
    /// Schema fragment that caused the error
    pub source: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, "\n\nLocation: {}", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// Renderer failure for one class
#[derive(Debug, Clone, PartialEq)]
pub struct RenderError {
    /// Class that failed to render
    pub class_name: String,
    /// Underlying cause
    pub message: String,
}

impl RenderError {
    /// Create a new render error
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to render class '{}': {}", self.class_name, self.message)
    }
}

impl std::error::Error for RenderError {}

/// Kind of check that rejected an instance value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Required value missing
    Required,
    /// Value has the wrong type
    InvalidType,
    /// Value differs from the declared constant
    InvalidConst,
    /// Value not in the declared enumeration
    InvalidEnum,
    /// String constraint violated (length, pattern)
    StringConstraint,
    /// Numeric constraint violated (range, multipleOf)
    NumericConstraint,
    /// Array constraint violated (items, size, uniqueness, contains)
    ArrayConstraint,
    /// Object constraint violated (additional/pattern properties, names, size)
    ObjectConstraint,
    /// Property or schema dependency violated
    Dependency,
    /// Filter rejected the value
    Filter,
    /// allOf / anyOf / oneOf / not rejected the value
    Composition,
    /// if / then / else rejected the value
    Conditional,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Required => "required",
            FailureKind::InvalidType => "invalid type",
            FailureKind::InvalidConst => "invalid const",
            FailureKind::InvalidEnum => "invalid enum",
            FailureKind::StringConstraint => "string constraint",
            FailureKind::NumericConstraint => "numeric constraint",
            FailureKind::ArrayConstraint => "array constraint",
            FailureKind::ObjectConstraint => "object constraint",
            FailureKind::Dependency => "dependency",
            FailureKind::Filter => "filter",
            FailureKind::Composition => "composition",
            FailureKind::Conditional => "conditional",
        };
        write!(f, "{}", name)
    }
}

/// Instance validation error with context
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Path to the value that failed validation
    pub path: Option<String>,
    /// Kind of the failing check
    pub kind: Option<FailureKind>,
    /// Original failure reason
    pub reason: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            kind: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the failure kind
    pub fn with_kind(mut self, kind: FailureKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref kind) = self.kind {
            write!(f, "\n\nCheck: {}", kind)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Whether no error has been collected
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of collected errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the collected errors
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Consume the collection
    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "- {}", error.message)?;
            if let Some(ref path) = error.path {
                write!(f, " (at {})", path)?;
            }
        }
        Ok(())
    }
}
