//! Validator descriptors
//!
//! A [`Validator`] describes one check that generated code performs when a
//! value is assigned. Validators are data, not closures: renderers turn them
//! into target-language checks and [`crate::instance`] interprets them.
//! Lower priorities execute first.

use serde_json::Value;

use super::property::{Property, PropertyHandle};
use super::types::JsonType;
use crate::error::FailureKind;
use std::rc::Rc;

/// Priority of required-value checks
pub const PRIORITY_REQUIRED: u32 = 1;
/// Priority of type checks
pub const PRIORITY_TYPE: u32 = 2;
/// Priority of filters
pub const PRIORITY_FILTER: u32 = 3;
/// Priority of single scalar constraints
pub const PRIORITY_SCALAR: u32 = 10;
/// Priority of array/object structure checks
pub const PRIORITY_STRUCTURE: u32 = 20;
/// Priority of allOf / anyOf / oneOf / not
pub const PRIORITY_COMPOSITION: u32 = 100;
/// Priority of if / then / else
pub const PRIORITY_CONDITIONAL: u32 = 110;

/// Schema combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// Every branch must accept
    AllOf,
    /// At least one branch must accept
    AnyOf,
    /// Exactly one branch must accept
    OneOf,
    /// The single branch must reject
    Not,
}

impl Combinator {
    /// All combinators in processing order
    pub const ALL: [Combinator; 4] = [
        Combinator::AllOf,
        Combinator::AnyOf,
        Combinator::OneOf,
        Combinator::Not,
    ];

    /// Schema keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            Combinator::AllOf => "allOf",
            Combinator::AnyOf => "anyOf",
            Combinator::OneOf => "oneOf",
            Combinator::Not => "not",
        }
    }

    /// Pass condition given `accepted` of `total` branches
    pub fn accepts(&self, accepted: usize, total: usize) -> bool {
        match self {
            Combinator::AllOf => accepted == total,
            Combinator::AnyOf => accepted > 0,
            Combinator::OneOf => accepted == 1,
            Combinator::Not => accepted == 0,
        }
    }

    /// Whether object branches collapse into one merged class
    ///
    /// Only combinators where several branches can apply to the same value
    /// merge; `oneOf` and `not` keep their branch classes distinct.
    pub fn merges_branches(&self) -> bool {
        matches!(self, Combinator::AllOf | Combinator::AnyOf)
    }
}

/// Handling of array items beyond a tuple definition
#[derive(Debug, Clone)]
pub enum AdditionalItems {
    /// Any extra items allowed
    Allowed,
    /// No extra items allowed
    Forbidden,
    /// Extra items must satisfy a schema
    Schema(Box<PropertyHandle>),
}

/// Handling of undeclared object properties
#[derive(Debug, Clone)]
pub enum AdditionalProperties {
    /// No undeclared properties allowed
    Forbidden,
    /// Undeclared properties must satisfy a schema
    Schema(Box<PropertyHandle>),
}

/// One `patternProperties` entry
#[derive(Debug, Clone)]
pub struct PatternProperty {
    /// Regular expression matched against property names
    pub pattern: String,
    /// Accessor key used by generated code
    pub key: String,
    /// Schema for matching values
    pub property: PropertyHandle,
}

/// A custom filter invocation
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    /// Registered filter token
    pub token: String,
    /// Options passed to the filter
    pub options: Value,
    /// Whether the filter replaces the value
    pub transforms: bool,
}

/// allOf / anyOf / oneOf / not over branch properties
#[derive(Debug, Clone)]
pub struct Composition {
    /// Combinator
    pub combinator: Combinator,
    /// Branch properties, stripped of branch-scoped validators
    pub branches: Vec<PropertyHandle>,
    /// Merged property when object branches collapse into one class
    pub merged: Option<Rc<Property>>,
}

impl Composition {
    /// Number of branches
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether there are no branches
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// if / then / else
#[derive(Debug, Clone)]
pub struct Conditional {
    /// Condition branch
    pub if_branch: Box<PropertyHandle>,
    /// Applied when the condition accepts
    pub then_branch: Option<Box<PropertyHandle>>,
    /// Applied when the condition rejects
    pub else_branch: Option<Box<PropertyHandle>>,
}

/// What a validator checks
#[derive(Debug, Clone)]
pub enum ValidatorKind {
    /// Value must be present
    Required,
    /// Value must have one of the types
    Type(Vec<JsonType>),
    /// Value must equal the constant
    Const(Value),
    /// Value must be one of the members
    Enum(Vec<Value>),
    /// Minimum string length in characters
    MinLength(u64),
    /// Maximum string length in characters
    MaxLength(u64),
    /// String must match the regular expression
    Pattern(String),
    /// Inclusive lower bound
    Minimum(f64),
    /// Inclusive upper bound
    Maximum(f64),
    /// Exclusive lower bound
    ExclusiveMinimum(f64),
    /// Exclusive upper bound
    ExclusiveMaximum(f64),
    /// Number must be a multiple of
    MultipleOf(f64),
    /// Minimum number of array items
    MinItems(u64),
    /// Maximum number of array items
    MaxItems(u64),
    /// Array items must be unique
    UniqueItems,
    /// Every item must satisfy the item property
    Items(Box<PropertyHandle>),
    /// Positional items
    TupleItems {
        /// Item property per position
        items: Vec<PropertyHandle>,
        /// Items beyond the tuple
        additional: AdditionalItems,
    },
    /// At least one item must satisfy the property
    Contains(Box<PropertyHandle>),
    /// Undeclared properties handling
    AdditionalProperties(AdditionalProperties),
    /// Properties matched by name pattern
    PatternProperties(Vec<PatternProperty>),
    /// Every property name must satisfy the property
    PropertyNames(Box<PropertyHandle>),
    /// Minimum number of properties
    MinProperties(u64),
    /// Maximum number of properties
    MaxProperties(u64),
    /// Presence of `property` requires the listed properties
    PropertyDependency {
        /// Triggering property
        property: String,
        /// Properties required when it is present
        requires: Vec<String>,
    },
    /// Presence of `property` requires the object to satisfy a schema
    SchemaDependency {
        /// Triggering property
        property: String,
        /// Schema applied to the whole object
        schema: Box<PropertyHandle>,
    },
    /// Custom filter
    Filter(FilterCall),
    /// allOf / anyOf / oneOf / not
    Composition(Composition),
    /// if / then / else
    Conditional(Conditional),
}

impl ValidatorKind {
    /// Default priority for this kind
    pub fn default_priority(&self) -> u32 {
        match self {
            ValidatorKind::Required => PRIORITY_REQUIRED,
            ValidatorKind::Type(_) => PRIORITY_TYPE,
            ValidatorKind::Filter(_) => PRIORITY_FILTER,
            ValidatorKind::Const(_)
            | ValidatorKind::Enum(_)
            | ValidatorKind::MinLength(_)
            | ValidatorKind::MaxLength(_)
            | ValidatorKind::Pattern(_)
            | ValidatorKind::Minimum(_)
            | ValidatorKind::Maximum(_)
            | ValidatorKind::ExclusiveMinimum(_)
            | ValidatorKind::ExclusiveMaximum(_)
            | ValidatorKind::MultipleOf(_)
            | ValidatorKind::MinItems(_)
            | ValidatorKind::MaxItems(_)
            | ValidatorKind::UniqueItems
            | ValidatorKind::MinProperties(_)
            | ValidatorKind::MaxProperties(_) => PRIORITY_SCALAR,
            ValidatorKind::Items(_)
            | ValidatorKind::TupleItems { .. }
            | ValidatorKind::Contains(_)
            | ValidatorKind::AdditionalProperties(_)
            | ValidatorKind::PatternProperties(_)
            | ValidatorKind::PropertyNames(_)
            | ValidatorKind::PropertyDependency { .. }
            | ValidatorKind::SchemaDependency { .. } => PRIORITY_STRUCTURE,
            ValidatorKind::Composition(_) => PRIORITY_COMPOSITION,
            ValidatorKind::Conditional(_) => PRIORITY_CONDITIONAL,
        }
    }

    /// Failure reported when this check rejects a value
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ValidatorKind::Required => FailureKind::Required,
            ValidatorKind::Type(_) => FailureKind::InvalidType,
            ValidatorKind::Const(_) => FailureKind::InvalidConst,
            ValidatorKind::Enum(_) => FailureKind::InvalidEnum,
            ValidatorKind::MinLength(_)
            | ValidatorKind::MaxLength(_)
            | ValidatorKind::Pattern(_) => FailureKind::StringConstraint,
            ValidatorKind::Minimum(_)
            | ValidatorKind::Maximum(_)
            | ValidatorKind::ExclusiveMinimum(_)
            | ValidatorKind::ExclusiveMaximum(_)
            | ValidatorKind::MultipleOf(_) => FailureKind::NumericConstraint,
            ValidatorKind::MinItems(_)
            | ValidatorKind::MaxItems(_)
            | ValidatorKind::UniqueItems
            | ValidatorKind::Items(_)
            | ValidatorKind::TupleItems { .. }
            | ValidatorKind::Contains(_) => FailureKind::ArrayConstraint,
            ValidatorKind::AdditionalProperties(_)
            | ValidatorKind::PatternProperties(_)
            | ValidatorKind::PropertyNames(_)
            | ValidatorKind::MinProperties(_)
            | ValidatorKind::MaxProperties(_) => FailureKind::ObjectConstraint,
            ValidatorKind::PropertyDependency { .. } | ValidatorKind::SchemaDependency { .. } => {
                FailureKind::Dependency
            }
            ValidatorKind::Filter(_) => FailureKind::Filter,
            ValidatorKind::Composition(_) => FailureKind::Composition,
            ValidatorKind::Conditional(_) => FailureKind::Conditional,
        }
    }

    /// Short name used by renderers and dumps
    pub fn name(&self) -> &'static str {
        match self {
            ValidatorKind::Required => "required",
            ValidatorKind::Type(_) => "type",
            ValidatorKind::Const(_) => "const",
            ValidatorKind::Enum(_) => "enum",
            ValidatorKind::MinLength(_) => "minLength",
            ValidatorKind::MaxLength(_) => "maxLength",
            ValidatorKind::Pattern(_) => "pattern",
            ValidatorKind::Minimum(_) => "minimum",
            ValidatorKind::Maximum(_) => "maximum",
            ValidatorKind::ExclusiveMinimum(_) => "exclusiveMinimum",
            ValidatorKind::ExclusiveMaximum(_) => "exclusiveMaximum",
            ValidatorKind::MultipleOf(_) => "multipleOf",
            ValidatorKind::MinItems(_) => "minItems",
            ValidatorKind::MaxItems(_) => "maxItems",
            ValidatorKind::UniqueItems => "uniqueItems",
            ValidatorKind::Items(_) => "items",
            ValidatorKind::TupleItems { .. } => "tupleItems",
            ValidatorKind::Contains(_) => "contains",
            ValidatorKind::AdditionalProperties(_) => "additionalProperties",
            ValidatorKind::PatternProperties(_) => "patternProperties",
            ValidatorKind::PropertyNames(_) => "propertyNames",
            ValidatorKind::MinProperties(_) => "minProperties",
            ValidatorKind::MaxProperties(_) => "maxProperties",
            ValidatorKind::PropertyDependency { .. } => "propertyDependency",
            ValidatorKind::SchemaDependency { .. } => "schemaDependency",
            ValidatorKind::Filter(_) => "filter",
            ValidatorKind::Composition(c) => c.combinator.keyword(),
            ValidatorKind::Conditional(_) => "if",
        }
    }

    /// Sub-properties evaluated by this check
    pub fn nested_properties(&self) -> Vec<&PropertyHandle> {
        match self {
            ValidatorKind::Items(item)
            | ValidatorKind::Contains(item)
            | ValidatorKind::PropertyNames(item) => vec![item.as_ref()],
            ValidatorKind::SchemaDependency { schema, .. } => vec![schema.as_ref()],
            ValidatorKind::TupleItems { items, additional } => {
                let mut nested: Vec<&PropertyHandle> = items.iter().collect();
                if let AdditionalItems::Schema(schema) = additional {
                    nested.push(schema);
                }
                nested
            }
            ValidatorKind::AdditionalProperties(AdditionalProperties::Schema(schema)) => {
                vec![schema.as_ref()]
            }
            ValidatorKind::PatternProperties(patterns) => {
                patterns.iter().map(|p| &p.property).collect()
            }
            ValidatorKind::Composition(composition) => composition.branches.iter().collect(),
            ValidatorKind::Conditional(conditional) => std::iter::once(&conditional.if_branch)
                .chain(conditional.then_branch.iter())
                .chain(conditional.else_branch.iter())
                .map(|b| b.as_ref())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Required-field and nested-composition enforcement
    ///
    /// These apply at a branch's own scope and are stripped when the branch
    /// is only used as a membership test inside an outer combinator.
    pub fn is_branch_scoped(&self) -> bool {
        matches!(
            self,
            ValidatorKind::Required | ValidatorKind::Composition(_) | ValidatorKind::Conditional(_)
        )
    }
}

/// A check with its execution priority
#[derive(Debug, Clone)]
pub struct Validator {
    /// What is checked
    pub kind: ValidatorKind,
    /// Execution order, lower first
    pub priority: u32,
}

impl Validator {
    /// Create a validator with the kind's default priority
    pub fn new(kind: ValidatorKind) -> Self {
        let priority = kind.default_priority();
        Self { kind, priority }
    }

    /// Override the priority
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Failure reported by this validator
    pub fn failure_kind(&self) -> FailureKind {
        self.kind.failure_kind()
    }
}

/// Insert keeping the list ordered by priority, stable for equal priorities
pub(crate) fn insert_ordered(validators: &mut Vec<Validator>, validator: Validator) {
    let position = validators
        .iter()
        .position(|existing| existing.priority > validator.priority)
        .unwrap_or(validators.len());
    validators.insert(position, validator);
}
