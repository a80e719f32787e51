//! Property and class model
//!
//! The intermediate representation produced by the processor and consumed
//! by renderers:
//!
//! - [`Property`] / [`PropertyHandle`]: typed class members, possibly reached
//!   through a [`PropertyProxy`] onto a [`PropertySlots`] entry
//! - [`Validator`]: ordered checks attached to properties and classes
//! - [`Schema`]: one generated class; [`GeneratedModel`] the finished graph

pub mod property;
pub mod schema;
pub mod types;
pub mod validator;

pub use property::{
    Decorator, Property, PropertyHandle, PropertyProxy, PropertySlot, PropertySlots,
    ResolutionState, SlotId,
};
pub use schema::{ClassRef, ClassRegistry, GeneratedModel, RegistryCheckpoint, Schema};
pub use types::{JsonType, TypeHint};
pub use validator::{
    AdditionalItems, AdditionalProperties, Combinator, Composition, Conditional, FilterCall,
    PatternProperty, Validator, ValidatorKind,
};
