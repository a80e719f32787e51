//! `$ref` handler

use serde_json::Value;
use std::rc::Rc;

use super::{RequiredSet, SchemaScope};
use crate::dictionary::Reference;
use crate::error::Result;
use crate::model::{PropertyHandle, Validator, ValidatorKind};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// Resolve a `$ref` node into a proxy carrying the use-site name and flags
pub fn build(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    required: &RequiredSet,
    name: &str,
    node: &SchemaNode,
) -> Result<PropertyHandle> {
    let raw = node
        .get("$ref")
        .and_then(Value::as_str)
        .ok_or_else(|| node.error("'$ref' must be a string"))?;
    let reference = Reference::parse(raw).map_err(|e| node.error(e.to_string()))?;

    let local = scope.dictionary();
    let dictionary = match &reference.document {
        Some(document)
            if local.get_definition(raw).is_none() && !local.is_same_document(document) =>
        {
            ctx.external_dictionary(document, node.origin())
                .map_err(|e| node.error(format!("Unresolved reference '{}': {}", raw, e)))?
        }
        _ => Rc::clone(local),
    };

    let (definition, path) = dictionary
        .locate(raw, &reference)
        .ok_or_else(|| node.error(format!("Unresolved reference '{}'", raw)))?;
    let mut property = definition.resolve(ctx, &dictionary, name, &path)?;

    if required.contains(name) {
        property.set_required(true);
        property.add_validator(Validator::new(ValidatorKind::Required));
    }
    if let Some(description) = node.get("description").and_then(Value::as_str) {
        property.set_description(description);
    }
    Ok(property)
}
