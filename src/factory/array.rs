//! Array handler

use serde_json::Value;

use super::{u64_keyword, PropertyFactory, RequiredSet, SchemaScope};
use crate::error::Result;
use crate::model::{AdditionalItems, JsonType, Property, Validator, ValidatorKind};
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// `type: array`
pub fn build(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
) -> Result<Property> {
    let mut property = Property::new(name).with_types(vec![JsonType::Array]);
    property.add_validator(Validator::new(ValidatorKind::Type(vec![JsonType::Array])));

    let none = RequiredSet::new();
    match node.get("items") {
        Some(Value::Object(_)) => {
            let items = child(node, &["items"])?;
            let item = PropertyFactory::create(ctx, scope, &none, &format!("{}_item", name), &items)?;
            property.add_validator(Validator::new(ValidatorKind::Items(Box::new(item))));
        }
        Some(Value::Array(tuple)) => {
            let mut items = Vec::with_capacity(tuple.len());
            for index in 0..tuple.len() {
                let position = child(node, &["items", &index.to_string()])?;
                items.push(PropertyFactory::create(
                    ctx,
                    scope,
                    &none,
                    &format!("{}_tuple_{}", name, index),
                    &position,
                )?);
            }

            let additional = match node.get("additionalItems") {
                Some(Value::Bool(false)) => AdditionalItems::Forbidden,
                Some(Value::Object(_)) => {
                    let schema = child(node, &["additionalItems"])?;
                    AdditionalItems::Schema(Box::new(PropertyFactory::create(
                        ctx,
                        scope,
                        &none,
                        &format!("{}_additional", name),
                        &schema,
                    )?))
                }
                _ => AdditionalItems::Allowed,
            };
            property.add_validator(Validator::new(ValidatorKind::TupleItems { items, additional }));
        }
        Some(Value::Bool(false)) => {
            property.add_validator(Validator::new(ValidatorKind::MaxItems(0)));
        }
        Some(Value::Bool(true)) | None => {}
        Some(_) => return Err(node.error("'items' must be a schema or a list of schemas").into()),
    }

    if node.get("contains").is_some_and(Value::is_object) {
        let contains = child(node, &["contains"])?;
        let item = PropertyFactory::create(ctx, scope, &none, &format!("{}_contains", name), &contains)?;
        property.add_validator(Validator::new(ValidatorKind::Contains(Box::new(item))));
    }

    if let Some(min) = u64_keyword(node, "minItems")? {
        property.add_validator(Validator::new(ValidatorKind::MinItems(min)));
    }
    if let Some(max) = u64_keyword(node, "maxItems")? {
        property.add_validator(Validator::new(ValidatorKind::MaxItems(max)));
    }
    if node.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false) {
        property.add_validator(Validator::new(ValidatorKind::UniqueItems));
    }

    Ok(property)
}

fn child(node: &SchemaNode, path: &[&str]) -> Result<SchemaNode> {
    node.navigate_path(path)
        .ok_or_else(|| node.error(format!("Missing '{}'", path.join("/"))).into())
}
