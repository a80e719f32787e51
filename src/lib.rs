//! # jsonschema-modelgen
//!
//! Compiles JSON Schema documents into a self-validating class model.
//!
//! Every object schema becomes a class; every member becomes a typed
//! property carrying an ordered list of validators. `$ref`s are resolved
//! lazily through proxies so recursive schemas terminate, and
//! `allOf`/`anyOf`/`oneOf`/`not`/`if` are compiled into composition
//! validators, with object branches merged into one class where they co-apply.
//!
//! ## Features
//!
//! - Per-file definition dictionaries with pending-slot reference resolution
//! - Cross-file references through a [`provider::SchemaProvider`]
//! - Signature-based class deduplication
//! - Custom filters on properties
//! - A [`render::Renderer`] seam with a JSON [`render::DumpRenderer`]
//! - A reference [`instance::Evaluator`] executing the model against data
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelgen::{DirectoryProvider, DumpRenderer, Generator, GeneratorConfig};
//!
//! let provider = DirectoryProvider::new("schemas")?;
//! let generator = Generator::new(GeneratorConfig::new().with_namespace_prefix("App"));
//! let report = generator.generate(&provider, &DumpRenderer::new(), "out")?;
//! println!("{} classes", report.class_count());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod config;

// Documents
pub mod locations;
pub mod loaders;
pub mod node;
pub mod names;

// Model and resolution
pub mod model;
pub mod dictionary;
pub mod filters;
pub mod factory;
pub mod composition;
pub mod processor;

// Collaborators
pub mod provider;
pub mod render;
pub mod generator;
pub mod instance;

// Re-exports for convenience
pub use config::GeneratorConfig;
pub use error::{Error, Result};
pub use generator::{GenerationReport, Generator};
pub use instance::{Evaluator, Instance, ObjectInstance};
pub use model::{ClassRef, GeneratedModel, Property, PropertyHandle, Schema};
pub use node::SchemaNode;
pub use processor::SchemaProcessor;
pub use provider::{DirectoryProvider, MemoryProvider, SchemaProvider};
pub use render::{DumpRenderer, Renderer};

/// Version of the jsonschema-modelgen library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
