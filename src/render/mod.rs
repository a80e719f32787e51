//! Rendering collaborators
//!
//! A [`Renderer`] turns one finished [`Schema`] into the text of one output
//! file. Template backends for concrete languages live outside this crate;
//! [`DumpRenderer`] writes a JSON description of each class so the model can
//! be inspected and diffed without one.

pub mod dump;

pub use dump::{ClassDump, DumpRenderer, PropertyDump, ValidatorDump};

use std::path::PathBuf;

use crate::error::RenderError;
use crate::model::{ClassRef, GeneratedModel, Schema};

/// Output of rendering one class
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedClass {
    /// Class the text was rendered for
    pub class: ClassRef,
    /// File path relative to the destination directory
    pub path: PathBuf,
    /// File content
    pub content: String,
}

impl RenderedClass {
    /// Create a rendered class placed by its class path
    pub fn new(class: ClassRef, extension: &str, content: impl Into<String>) -> Self {
        let path = Self::relative_path(&class, extension);
        Self {
            class,
            path,
            content: content.into(),
        }
    }

    /// `A/B/Name.ext` for class path `[A, B]`
    pub fn relative_path(class: &ClassRef, extension: &str) -> PathBuf {
        let mut path: PathBuf = class.class_path().iter().collect();
        path.push(format!("{}.{}", class.class_name(), extension));
        path
    }
}

/// Turns resolved classes into source text
pub trait Renderer {
    /// Extension of generated files, without the dot
    fn file_extension(&self) -> &str;

    /// Render one class; the whole model is available for cross-class lookups
    fn render(&self, schema: &Schema, model: &GeneratedModel) -> Result<RenderedClass, RenderError>;
}
