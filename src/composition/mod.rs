//! Composition engine
//!
//! `allOf`, `anyOf`, `oneOf` and `not` become [`Composition`] validators over
//! branch properties. Each branch is built through the property factory,
//! then stripped of branch-scoped validators (required-field and nested
//! composition checks), since the branch is only used as a membership test.
//! At validation time the accepting branches are counted and compared with
//! [`Combinator::accepts`].
//!
//! On a property, two or more object branches of a merging combinator are
//! collapsed into one merged class (see [`merge`]). On a class, object
//! branch members are transferred into the class itself.

pub mod conditional;
pub mod merge;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::factory::{PropertyFactory, RequiredSet, SchemaScope};
use crate::model::{
    Combinator, Composition, JsonType, Property, PropertyHandle, Schema, Validator, ValidatorKind,
};
use crate::node::SchemaNode;
use crate::processor::RunContext;

pub use merge::MergedPropertyCache;

/// Attach property-level compositions and conditionals
pub fn attach_property(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
    property: &mut Property,
) -> Result<()> {
    let inherited = node.get("type").cloned();

    for combinator in Combinator::ALL {
        let required = RequiredSet::single(name, property.is_required());
        let Some(branches) =
            build_branches(ctx, scope, &required, name, node, combinator, inherited.as_ref())?
        else {
            continue;
        };

        let object_branches = branches
            .iter()
            .filter(|branch| branch.nested_schema(&ctx.slots).is_some())
            .count();
        let merged = if combinator.merges_branches() && object_branches >= 2 {
            merge::merged_property(ctx, scope, name, node, &branches)?
        } else {
            None
        };

        if combinator == Combinator::Not && !property.is_required() {
            property.set_required(true);
            property.add_validator(Validator::new(ValidatorKind::Required));
        }

        debug!(
            property = name,
            combinator = combinator.keyword(),
            branches = branches.len(),
            merged = merged.is_some(),
            "attached composition"
        );
        property.add_validator(Validator::new(ValidatorKind::Composition(Composition {
            combinator,
            branches,
            merged,
        })));
    }

    let required = RequiredSet::single(name, property.is_required());
    if let Some(conditional) =
        conditional::build(ctx, scope, &required, name, node, inherited.as_ref())?
    {
        property.add_validator(Validator::new(ValidatorKind::Conditional(conditional)));
    }

    Ok(())
}

/// Attach class-level compositions and conditionals
///
/// Branches are checked against the whole object as base validators. For
/// `allOf`, `anyOf` and `oneOf` the members of object branches are also
/// copied into the class (existing names win) with their validators
/// cleared, so every branch's fields are reachable on the class.
pub fn attach_class(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    node: &SchemaNode,
    schema: &mut Schema,
) -> Result<()> {
    let inherited = Some(
        node.get("type")
            .cloned()
            .unwrap_or_else(|| Value::String(JsonType::Object.as_str().to_string())),
    );
    let none = RequiredSet::new();

    for combinator in Combinator::ALL {
        let keyword = combinator.keyword();
        let Some(branches) =
            build_branches(ctx, scope, &none, keyword, node, combinator, inherited.as_ref())?
        else {
            continue;
        };

        if combinator != Combinator::Not {
            transfer_members(ctx, &branches, schema);
        }

        debug!(class = %schema.class(), combinator = keyword, branches = branches.len(), "attached class composition");
        schema.add_base_validator(Validator::new(ValidatorKind::Composition(Composition {
            combinator,
            branches,
            merged: None,
        })));
    }

    if let Some(conditional) =
        conditional::build(ctx, scope, &none, "if", node, inherited.as_ref())?
    {
        schema.add_base_validator(Validator::new(ValidatorKind::Conditional(conditional)));
    }

    Ok(())
}

/// Copy object branch members into a class
fn transfer_members(ctx: &RunContext<'_>, branches: &[PropertyHandle], schema: &mut Schema) {
    for branch in branches {
        let Some(class) = branch.nested_schema(&ctx.slots) else {
            continue;
        };
        if class == schema.class() {
            continue;
        }
        match ctx.registry.get(class) {
            Some(branch_schema) => {
                for member in branch_schema.properties().values() {
                    schema.add_property(member.detached());
                }
            }
            None => warn!(
                class = %schema.class(),
                branch = %class,
                "branch class still under construction, members not transferred"
            ),
        }
    }
}

/// Build the stripped branch properties of one combinator, if present
pub(crate) fn build_branches(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    required: &RequiredSet,
    name: &str,
    node: &SchemaNode,
    combinator: Combinator,
    inherited: Option<&Value>,
) -> Result<Option<Vec<PropertyHandle>>> {
    let keyword = combinator.keyword();
    let Some(value) = node.get(keyword) else {
        return Ok(None);
    };

    let paths: Vec<Vec<String>> = match (combinator, value) {
        (Combinator::Not, Value::Object(_)) => vec![vec![keyword.to_string()]],
        (Combinator::Not, _) => return Err(node.error("'not' must be a schema").into()),
        (_, Value::Array(items)) if !items.is_empty() => (0..items.len())
            .map(|i| vec![keyword.to_string(), i.to_string()])
            .collect(),
        _ => {
            return Err(node
                .error(format!("'{}' must be a non-empty list of schemas", keyword))
                .into())
        }
    };

    let mut branches = Vec::with_capacity(paths.len());
    for path in paths {
        let branch = branch_node(node, &path, inherited)?;
        let mut property = PropertyFactory::create(ctx, scope, required, name, &branch)?;
        property.strip_branch_scoped();
        branches.push(property);
    }
    Ok(Some(branches))
}

/// Branch node, inheriting the enclosing `type` when it declares none
pub(crate) fn branch_node(
    node: &SchemaNode,
    path: &[String],
    inherited: Option<&Value>,
) -> Result<SchemaNode> {
    let branch = node
        .navigate_path(path)
        .ok_or_else(|| node.error(format!("Missing composition branch '{}'", path.join("/"))))?;

    let Some(inherited) = inherited else {
        return Ok(branch);
    };
    match branch.content() {
        Value::Object(map) if !map.contains_key("type") && !map.contains_key("$ref") && !map.contains_key("const") => {
            let mut content: Map<String, Value> = map.clone();
            content.insert("type".to_string(), inherited.clone());
            Ok(branch.with_content(Value::Object(content)))
        }
        _ => Ok(branch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::Location;
    use serde_json::json;

    #[test]
    fn test_branch_node_inherits_type() {
        let node = SchemaNode::new(
            json!({"type": "string", "anyOf": [{"minLength": 2}, {"type": "integer"}, {"$ref": "#/a"}]}),
            Location::String("t.json".into()),
        );
        let inherited = node.get("type");
        let path = |i: usize| vec!["anyOf".to_string(), i.to_string()];

        let first = branch_node(&node, &path(0), inherited).unwrap();
        assert_eq!(first.content(), &json!({"minLength": 2, "type": "string"}));
        assert_eq!(first.pointer(), "#/anyOf/0");

        let second = branch_node(&node, &path(1), inherited).unwrap();
        assert_eq!(second.content(), &json!({"type": "integer"}));

        let third = branch_node(&node, &path(2), inherited).unwrap();
        assert_eq!(third.content(), &json!({"$ref": "#/a"}));
    }
}
