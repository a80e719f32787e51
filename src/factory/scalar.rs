//! Scalar, constant, untyped and multi-type handlers

use regex::Regex;
use serde_json::{Map, Value};

use super::{array, f64_keyword, object, u64_keyword, SchemaScope};
use crate::error::Result;
use crate::model::{JsonType, Property, Validator, ValidatorKind};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// `type: string|integer|number|boolean|null`
pub fn build_scalar(node: &SchemaNode, name: &str, json_type: JsonType) -> Result<Property> {
    let mut property = Property::new(name).with_types(vec![json_type]);
    property.add_validator(Validator::new(ValidatorKind::Type(vec![json_type])));
    add_constraints(&mut property, node, &[json_type])?;
    Ok(property)
}

/// `const`: the value fixes the type
pub fn build_const(node: &SchemaNode, name: &str) -> Result<Property> {
    let value = node.get("const").cloned().unwrap_or(Value::Null);
    let mut property = Property::new(name).with_types(vec![JsonType::of(&value)]);
    property.add_validator(Validator::new(ValidatorKind::Const(value)));
    Ok(property)
}

/// Keywords that only constrain objects
const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "required",
    "additionalProperties",
    "patternProperties",
    "propertyNames",
    "minProperties",
    "maxProperties",
    "dependencies",
];

/// Keywords that only constrain arrays
const ARRAY_KEYWORDS: &[&str] = &["items", "additionalItems", "contains", "minItems", "maxItems", "uniqueItems"];

/// Keywords attached on the property itself, not on a narrowed structure
const PROPERTY_SCOPED_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "not", "if", "then", "else"];

/// No `type`: any value, constraints apply to values of their own type
///
/// Object keywords build a class that object values are instantiated
/// from; array keywords add their checks. Neither adds a type check.
pub fn build_any(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
) -> Result<Property> {
    let mut property = Property::new(name);

    if OBJECT_KEYWORDS.iter().any(|keyword| node.has(keyword)) {
        let built = object::build(ctx, scope, name, &narrow(node, JsonType::Object))?;
        for decorator in built.decorators() {
            property.add_decorator(decorator.clone());
        }
        if let Some(class) = built.nested_schema() {
            property.set_nested_schema(class.clone());
        }
    }

    if ARRAY_KEYWORDS.iter().any(|keyword| node.has(keyword)) {
        let built = array::build(ctx, scope, name, &narrow(node, JsonType::Array))?;
        for validator in built.validators() {
            if !matches!(validator.kind, ValidatorKind::Type(_)) {
                property.add_validator(validator.clone());
            }
        }
    }

    add_constraints(&mut property, node, &[JsonType::String, JsonType::Number])?;
    Ok(property)
}

/// Node typed as `json_type`, without the keywords the property keeps
fn narrow(node: &SchemaNode, json_type: JsonType) -> SchemaNode {
    let mut content = node.content().as_object().cloned().unwrap_or_else(Map::new);
    content.retain(|key, _| !PROPERTY_SCOPED_KEYWORDS.contains(&key.as_str()));
    content.insert("type".to_string(), Value::String(json_type.as_str().to_string()));
    node.with_content(Value::Object(content))
}

/// `type: [..]` with several entries
///
/// A list with one structural type (`array` or `object`) builds that
/// structure and widens its type check to the other entries.
pub fn build_multi(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
    types: &[JsonType],
) -> Result<Property> {
    let structural: Vec<JsonType> = types.iter().copied().filter(|t| !t.is_primitive()).collect();

    let mut property = match structural.as_slice() {
        [] => {
            let mut property = Property::new(name).with_types(types.to_vec());
            property.add_validator(Validator::new(ValidatorKind::Type(types.to_vec())));
            property
        }
        [single] => {
            let mut content = node.content().as_object().cloned().unwrap_or_else(Map::new);
            content.insert("type".to_string(), Value::String(single.as_str().to_string()));
            let narrowed = node.with_content(Value::Object(content));
            let built = match single {
                JsonType::Array => array::build(ctx, scope, name, &narrowed)?,
                _ => object::build(ctx, scope, name, &narrowed)?,
            };
            widen(built, types)
        }
        _ => {
            return Err(node
                .error(format!(
                    "Unsupported property type list for '{}': only one of 'array' and 'object' may be combined with other types",
                    name
                ))
                .into())
        }
    };

    add_constraints(&mut property, node, types)?;
    Ok(property)
}

/// Replace the type check of a structural property by the full type list
fn widen(property: Property, types: &[JsonType]) -> Property {
    let mut widened = property.clone().with_types(types.to_vec());
    widened.clear_validators();
    for validator in property.validators() {
        let validator = match &validator.kind {
            ValidatorKind::Type(_) => Validator::new(ValidatorKind::Type(types.to_vec())),
            _ => validator.clone(),
        };
        widened.add_validator(validator);
    }
    widened
}

/// String and numeric constraints for the types a property can hold
pub(crate) fn add_constraints(
    property: &mut Property,
    node: &SchemaNode,
    types: &[JsonType],
) -> Result<()> {
    if types.contains(&JsonType::String) {
        add_string_constraints(property, node)?;
    }
    if types.contains(&JsonType::Integer) || types.contains(&JsonType::Number) {
        add_numeric_constraints(property, node)?;
    }
    Ok(())
}

fn add_string_constraints(property: &mut Property, node: &SchemaNode) -> Result<()> {
    if let Some(min) = u64_keyword(node, "minLength")? {
        property.add_validator(Validator::new(ValidatorKind::MinLength(min)));
    }
    if let Some(max) = u64_keyword(node, "maxLength")? {
        property.add_validator(Validator::new(ValidatorKind::MaxLength(max)));
    }
    if let Some(pattern) = node.get("pattern") {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| node.error("'pattern' must be a string"))?;
        Regex::new(pattern)
            .map_err(|e| node.error(format!("Invalid pattern '{}': {}", pattern, e)))?;
        property.add_validator(Validator::new(ValidatorKind::Pattern(pattern.to_string())));
    }
    Ok(())
}

fn add_numeric_constraints(property: &mut Property, node: &SchemaNode) -> Result<()> {
    // draft-04 boolean exclusive bounds turn the plain bound exclusive
    let exclusive_min = node.get("exclusiveMinimum").and_then(Value::as_bool).unwrap_or(false);
    let exclusive_max = node.get("exclusiveMaximum").and_then(Value::as_bool).unwrap_or(false);

    if let Some(min) = f64_keyword(node, "minimum")? {
        property.add_validator(Validator::new(if exclusive_min {
            ValidatorKind::ExclusiveMinimum(min)
        } else {
            ValidatorKind::Minimum(min)
        }));
    }
    if let Some(max) = f64_keyword(node, "maximum")? {
        property.add_validator(Validator::new(if exclusive_max {
            ValidatorKind::ExclusiveMaximum(max)
        } else {
            ValidatorKind::Maximum(max)
        }));
    }
    if let Some(min) = node.get("exclusiveMinimum").and_then(Value::as_f64) {
        property.add_validator(Validator::new(ValidatorKind::ExclusiveMinimum(min)));
    }
    if let Some(max) = node.get("exclusiveMaximum").and_then(Value::as_f64) {
        property.add_validator(Validator::new(ValidatorKind::ExclusiveMaximum(max)));
    }
    if let Some(factor) = f64_keyword(node, "multipleOf")? {
        if factor <= 0.0 {
            return Err(node.error("'multipleOf' must be greater than 0").into());
        }
        property.add_validator(Validator::new(ValidatorKind::MultipleOf(factor)));
    }
    Ok(())
}
