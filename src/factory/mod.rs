//! Property factory
//!
//! [`PropertyFactory::create`] turns one schema node into a property. The
//! node is normalized first, its [`TypeTag`] detected, and the matching
//! handler invoked:
//!
//! | Tag | Handler |
//! |-----|---------|
//! | `Const` | [`scalar::build_const`] |
//! | `Reference` | [`reference::build`] |
//! | `MultiType` | [`scalar::build_multi`] |
//! | `Any` | [`scalar::build_any`] |
//! | `String` .. `Null` | [`scalar::build_scalar`] |
//! | `Array` | [`array::build`] |
//! | `Object` | [`object::build`] |
//!
//! Every handler except the reference handler returns an unfinished
//! [`Property`]; [`finish`] then attaches what all types share (required,
//! description, default, enum, filters and composition).

pub mod array;
pub mod object;
pub mod reference;
pub mod scalar;

use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

use crate::composition;
use crate::dictionary::SchemaDefinitionDictionary;
use crate::error::{Error, Result};
use crate::model::{
    ClassRef, Decorator, JsonType, Property, PropertyHandle, Validator, ValidatorKind,
};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// Handler selector for a schema node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    /// Node has `const`
    Const,
    /// Node has `$ref`
    Reference,
    /// `type` is a list of several types
    MultiType(Vec<JsonType>),
    /// No `type`
    Any,
    /// `"string"`
    String,
    /// `"integer"`
    Integer,
    /// `"number"`
    Number,
    /// `"boolean"`
    Boolean,
    /// `"null"`
    Null,
    /// `"array"`
    Array,
    /// `"object"`
    Object,
}

impl TypeTag {
    /// Detect the tag of a node, in priority order
    ///
    /// `const` wins over `$ref`, which wins over `type`. An unknown type name
    /// is a schema error.
    pub fn detect(node: &SchemaNode) -> Result<TypeTag> {
        if node.has("const") {
            return Ok(TypeTag::Const);
        }
        if node.has("$ref") {
            return Ok(TypeTag::Reference);
        }

        match node.get("type") {
            None => Ok(TypeTag::Any),
            Some(Value::String(name)) => Self::from_type(Self::parse_type(node, name)?),
            Some(Value::Array(names)) => {
                let mut types = Vec::new();
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| node.error("Type list entries must be strings"))?;
                    let json_type = Self::parse_type(node, name)?;
                    if !types.contains(&json_type) {
                        types.push(json_type);
                    }
                }
                match types.as_slice() {
                    [] => Ok(TypeTag::Any),
                    [single] => Self::from_type(*single),
                    _ => Ok(TypeTag::MultiType(types)),
                }
            }
            Some(other) => Err(node
                .error(format!("Unsupported property type {}", other))
                .into()),
        }
    }

    fn parse_type(node: &SchemaNode, name: &str) -> Result<JsonType> {
        JsonType::from_name(name).ok_or_else(|| {
            node.error(format!("Unsupported property type '{}'", name))
                .into()
        })
    }

    fn from_type(json_type: JsonType) -> Result<TypeTag> {
        Ok(match json_type {
            JsonType::String => TypeTag::String,
            JsonType::Integer => TypeTag::Integer,
            JsonType::Number => TypeTag::Number,
            JsonType::Boolean => TypeTag::Boolean,
            JsonType::Null => TypeTag::Null,
            JsonType::Array => TypeTag::Array,
            JsonType::Object => TypeTag::Object,
        })
    }

    /// Scalar type handled by [`scalar::build_scalar`]
    pub fn scalar_type(&self) -> Option<JsonType> {
        match self {
            TypeTag::String => Some(JsonType::String),
            TypeTag::Integer => Some(JsonType::Integer),
            TypeTag::Number => Some(JsonType::Number),
            TypeTag::Boolean => Some(JsonType::Boolean),
            TypeTag::Null => Some(JsonType::Null),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Const => write!(f, "const"),
            TypeTag::Reference => write!(f, "reference"),
            TypeTag::MultiType(types) => {
                let names: Vec<_> = types.iter().map(JsonType::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
            TypeTag::Any => write!(f, "any"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Integer => write!(f, "integer"),
            TypeTag::Number => write!(f, "number"),
            TypeTag::Boolean => write!(f, "boolean"),
            TypeTag::Null => write!(f, "null"),
            TypeTag::Array => write!(f, "array"),
            TypeTag::Object => write!(f, "object"),
        }
    }
}

/// Names of the members that are required in the enclosing object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSet {
    names: Vec<String>,
}

impl RequiredSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `required` keyword of an object node
    pub fn from_node(node: &SchemaNode) -> Self {
        let names = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self { names }
    }

    /// Set containing `name` if `required`
    pub fn single(name: &str, required: bool) -> Self {
        Self {
            names: if required { vec![name.to_string()] } else { Vec::new() },
        }
    }

    /// Check whether a member is required
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Required names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Class and document a property is being built in
#[derive(Debug, Clone)]
pub struct SchemaScope {
    class: ClassRef,
    dictionary: Rc<SchemaDefinitionDictionary>,
}

impl SchemaScope {
    /// Create a scope
    pub fn new(class: ClassRef, dictionary: Rc<SchemaDefinitionDictionary>) -> Self {
        Self { class, dictionary }
    }

    /// Class currently being built
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Definitions of the current document
    pub fn dictionary(&self) -> &Rc<SchemaDefinitionDictionary> {
        &self.dictionary
    }
}

/// Type dispatch entry point
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyFactory;

impl PropertyFactory {
    /// Build the property for `node` named `name`
    pub fn create(
        ctx: &mut RunContext<'_>,
        scope: &SchemaScope,
        required: &RequiredSet,
        name: &str,
        node: &SchemaNode,
    ) -> Result<PropertyHandle> {
        if !node.is_object() {
            return Err(node
                .error(format!("Schema for property '{}' must be an object", name))
                .into());
        }
        let node = node.normalize();

        ctx.descend()?;
        let result = Self::dispatch(ctx, scope, required, name, &node);
        ctx.ascend();
        result
    }

    fn dispatch(
        ctx: &mut RunContext<'_>,
        scope: &SchemaScope,
        required: &RequiredSet,
        name: &str,
        node: &SchemaNode,
    ) -> Result<PropertyHandle> {
        let tag = TypeTag::detect(node)?;
        trace!(property = name, tag = %tag, pointer = node.pointer(), "building property");

        let property = match &tag {
            TypeTag::Reference => return reference::build(ctx, scope, required, name, node),
            TypeTag::Const => scalar::build_const(node, name)?,
            TypeTag::MultiType(types) => scalar::build_multi(ctx, scope, name, node, types)?,
            TypeTag::Any => scalar::build_any(ctx, scope, name, node)?,
            TypeTag::Array => array::build(ctx, scope, name, node)?,
            TypeTag::Object => object::build(ctx, scope, name, node)?,
            scalar_tag => {
                let json_type = scalar_tag
                    .scalar_type()
                    .ok_or_else(|| Error::schema(format!("Unsupported property type '{}'", scalar_tag)))?;
                scalar::build_scalar(node, name, json_type)?
            }
        };

        finish(ctx, scope, required, name, node, property).map(PropertyHandle::Owned)
    }
}

/// Attach the parts every property type shares
pub(crate) fn finish(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    required: &RequiredSet,
    name: &str,
    node: &SchemaNode,
    mut property: Property,
) -> Result<Property> {
    if required.contains(name) {
        property.set_required(true);
        property.add_validator(Validator::new(ValidatorKind::Required));
    }

    if let Some(description) = node.get("description").and_then(Value::as_str) {
        property.set_description(description);
    }

    if let Some(format) = node.get("format").and_then(Value::as_str) {
        warn!(property = name, format, location = %node.location(), "format is not enforced");
        property.set_format(format);
    }

    if let Some(values) = node.get("enum") {
        let values = values
            .as_array()
            .filter(|values| !values.is_empty())
            .ok_or_else(|| node.error("'enum' must be a non-empty array"))?;
        property.add_validator(Validator::new(ValidatorKind::Enum(values.clone())));
    }

    let types = property.types().to_vec();
    for call in ctx.filters.calls_for(node, &types)? {
        if call.transforms {
            property.add_decorator(Decorator::Filter {
                token: call.token.clone(),
            });
        }
        property.add_validator(Validator::new(ValidatorKind::Filter(call)));
    }

    if let Some(default) = node.get("default") {
        property.set_default(default.clone());
    } else if ctx.config.default_arrays_to_empty
        && !property.is_required()
        && property.types() == [JsonType::Array]
    {
        property.set_default(Value::Array(Vec::new()));
    }

    // object classes carry their own compositions as base validators
    if !property.types().contains(&JsonType::Object) {
        composition::attach_property(ctx, scope, name, node, &mut property)?;
    }

    Ok(property)
}

/// Read a non-negative integer keyword
pub(crate) fn u64_keyword(node: &SchemaNode, keyword: &str) -> Result<Option<u64>> {
    match node.get(keyword) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| {
                node.error(format!("'{}' must be a non-negative integer", keyword))
                    .into()
            }),
    }
}

/// Read a numeric keyword
pub(crate) fn f64_keyword(node: &SchemaNode, keyword: &str) -> Result<Option<f64>> {
    match node.get(keyword) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| node.error(format!("'{}' must be a number", keyword)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::Location;
    use serde_json::json;

    fn node(content: Value) -> SchemaNode {
        SchemaNode::new(content, Location::String("t.json".into()))
    }

    #[test]
    fn test_detect_priority() {
        assert_eq!(
            TypeTag::detect(&node(json!({"const": 1, "$ref": "#/a", "type": "string"}))).unwrap(),
            TypeTag::Const
        );
        assert_eq!(
            TypeTag::detect(&node(json!({"$ref": "#/a", "type": "string"}))).unwrap(),
            TypeTag::Reference
        );
        assert_eq!(TypeTag::detect(&node(json!({}))).unwrap(), TypeTag::Any);
        assert_eq!(
            TypeTag::detect(&node(json!({"type": "integer"}))).unwrap(),
            TypeTag::Integer
        );
    }

    #[test]
    fn test_detect_type_lists() {
        assert_eq!(
            TypeTag::detect(&node(json!({"type": ["string", "null"]}))).unwrap(),
            TypeTag::MultiType(vec![JsonType::String, JsonType::Null])
        );
        assert_eq!(
            TypeTag::detect(&node(json!({"type": ["string"]}))).unwrap(),
            TypeTag::String
        );
    }

    #[test]
    fn test_detect_unknown_type() {
        let err = TypeTag::detect(&node(json!({"type": "decimal"}))).unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("Unsupported property type 'decimal'"));
    }

    #[test]
    fn test_required_set() {
        let set = RequiredSet::from_node(&node(json!({"required": ["a", "b"]})));
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
        assert!(RequiredSet::single("x", true).contains("x"));
        assert!(!RequiredSet::single("x", false).contains("x"));
    }

    #[test]
    fn test_u64_keyword() {
        let n = node(json!({"minLength": 3, "maxLength": -1, "minItems": 2.0}));
        assert_eq!(u64_keyword(&n, "minLength").unwrap(), Some(3));
        assert_eq!(u64_keyword(&n, "minItems").unwrap(), Some(2));
        assert!(u64_keyword(&n, "maxLength").is_err());
        assert_eq!(u64_keyword(&n, "absent").unwrap(), None);
    }
}
