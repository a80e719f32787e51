//! Object handler and class builder
//!
//! Every object schema becomes a class. Classes are reserved in the registry
//! before their members are built, so a member that refers back to the
//! class being built (directly or through `$ref: "#"`) reuses it instead of
//! recursing. Structurally identical nested objects share one class, within
//! one document when they contain a `$ref`.

use regex::Regex;
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{debug, info};

use super::{u64_keyword, PropertyFactory, RequiredSet, SchemaScope};
use crate::composition;
use crate::dictionary::{SchemaDefinitionDictionary, ROOT_KEY};
use crate::error::Result;
use crate::model::{
    AdditionalProperties, ClassRef, Decorator, JsonType, PatternProperty, Property, Schema,
    Validator, ValidatorKind,
};
use crate::names;
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// `type: object`
pub fn build(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
) -> Result<Property> {
    let dictionary = scope.dictionary();
    let class = if node.pointer() == ROOT_KEY && node.origin() == dictionary.origin() {
        dictionary.owner().clone()
    } else {
        scope.class().sibling(names::class_name(
            name,
            node.content(),
            false,
            scope.class().class_name(),
        ))
    };
    let class = process_class(ctx, dictionary, node, class, true)?;

    let mut property = Property::new(name).with_types(vec![JsonType::Object]);
    property.add_validator(Validator::new(ValidatorKind::Type(vec![JsonType::Object])));
    property.add_decorator(Decorator::ObjectInstantiation {
        class: class.clone(),
    });
    property.set_nested_schema(class);
    Ok(property)
}

/// Build (or reuse) the class for an object node
///
/// With `dedup` set, a class with the same structural signature built
/// earlier in the run is returned instead of a new one.
pub fn process_class(
    ctx: &mut RunContext<'_>,
    dictionary: &Rc<SchemaDefinitionDictionary>,
    node: &SchemaNode,
    class: ClassRef,
    dedup: bool,
) -> Result<ClassRef> {
    names::validate_class_name(class.class_name())?;
    if ctx.registry.contains(&class) {
        debug!(class = %class, "reusing class");
        return Ok(class);
    }

    let signature = node.dedup_key();
    if dedup {
        if let Some(existing) = ctx.registry.find_by_signature(&signature) {
            debug!(class = %class, existing = %existing, "deduplicated class by signature");
            return Ok(existing.clone());
        }
    }

    ctx.config.limits.check_classes(ctx.registry.len() + 1)?;
    ctx.registry.reserve(&class, Some(&signature));

    // a bare `$ref` at class level is an allOf with one branch
    let node = if node.has("$ref") {
        node.with_content(serde_json::json!({ "allOf": [node.content()] }))
    } else {
        node.clone()
    };

    let scope = SchemaScope::new(class.clone(), Rc::clone(dictionary));
    let mut schema = Schema::new(class.clone(), node.clone(), Rc::clone(dictionary));
    let required = RequiredSet::from_node(&node);

    add_properties(ctx, &scope, &node, &required, &mut schema)?;
    add_base_validators(ctx, &scope, &node, &mut schema)?;
    composition::attach_class(ctx, &scope, &node, &mut schema)?;

    if ctx.config.output_enabled {
        info!(class = %class, properties = schema.properties().len(), "generated class");
    } else {
        debug!(class = %class, properties = schema.properties().len(), "generated class");
    }
    ctx.registry.complete(schema)?;
    Ok(class)
}

fn add_properties(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    node: &SchemaNode,
    required: &RequiredSet,
    schema: &mut Schema,
) -> Result<()> {
    match node.get("properties") {
        None => {}
        Some(Value::Object(members)) => {
            let names: Vec<String> = members.keys().cloned().collect();
            for name in names {
                let member = node
                    .navigate_path(&["properties", name.as_str()])
                    .ok_or_else(|| node.error(format!("Missing property '{}'", name)))?;
                let property = PropertyFactory::create(ctx, scope, required, &name, &member)?;
                schema.add_property(property);
            }
        }
        Some(_) => return Err(node.error("'properties' must be an object").into()),
    }

    // required but undeclared members still have to be present
    for name in required.names() {
        if schema.property(name).is_none() {
            let mut property = Property::new(name.as_str());
            property.set_required(true);
            property.add_validator(Validator::new(ValidatorKind::Required));
            schema.add_property(property.into());
        }
    }
    Ok(())
}

fn add_base_validators(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    node: &SchemaNode,
    schema: &mut Schema,
) -> Result<()> {
    let none = RequiredSet::new();

    match node.get("additionalProperties") {
        Some(Value::Bool(false)) => schema.add_base_validator(Validator::new(
            ValidatorKind::AdditionalProperties(AdditionalProperties::Forbidden),
        )),
        Some(Value::Object(_)) => {
            let additional = child(node, &["additionalProperties"])?;
            let property =
                PropertyFactory::create(ctx, scope, &none, "additionalProperties", &additional)?;
            schema.add_base_validator(Validator::new(ValidatorKind::AdditionalProperties(
                AdditionalProperties::Schema(Box::new(property)),
            )));
        }
        Some(Value::Bool(true)) | None => {}
        Some(_) => return Err(node.error("'additionalProperties' must be a boolean or a schema").into()),
    }

    if let Some(patterns) = node.get("patternProperties") {
        let patterns = patterns
            .as_object()
            .ok_or_else(|| node.error("'patternProperties' must be an object"))?;
        let mut entries: Vec<PatternProperty> = Vec::new();
        for (pattern, definition) in patterns {
            Regex::new(pattern)
                .map_err(|e| node.error(format!("Invalid pattern property '{}': {}", pattern, e)))?;
            let key = definition
                .get("key")
                .and_then(Value::as_str)
                .unwrap_or(pattern)
                .to_string();
            if entries.iter().any(|entry| entry.key == key) {
                return Err(node
                    .error(format!("Duplicate pattern property access key '{}'", key))
                    .into());
            }
            let member = child(node, &["patternProperties", pattern.as_str()])?;
            let property = PropertyFactory::create(ctx, scope, &none, &key, &member)?;
            entries.push(PatternProperty {
                pattern: pattern.clone(),
                key,
                property,
            });
        }
        if !entries.is_empty() {
            schema.add_base_validator(Validator::new(ValidatorKind::PatternProperties(entries)));
        }
    }

    if node.get("propertyNames").is_some_and(Value::is_object) {
        let names_node = child(node, &["propertyNames"])?;
        let mut content = names_node.content().as_object().cloned().unwrap_or_else(Map::new);
        content
            .entry("type".to_string())
            .or_insert_with(|| Value::String("string".to_string()));
        let names_node = names_node.with_content(Value::Object(content));
        let property = PropertyFactory::create(ctx, scope, &none, "propertyNames", &names_node)?;
        schema.add_base_validator(Validator::new(ValidatorKind::PropertyNames(Box::new(property))));
    }

    if let Some(min) = u64_keyword(node, "minProperties")? {
        schema.add_base_validator(Validator::new(ValidatorKind::MinProperties(min)));
    }
    if let Some(max) = u64_keyword(node, "maxProperties")? {
        schema.add_base_validator(Validator::new(ValidatorKind::MaxProperties(max)));
    }

    if let Some(dependencies) = node.get("dependencies") {
        let dependencies = dependencies
            .as_object()
            .ok_or_else(|| node.error("'dependencies' must be an object"))?;
        for (property, dependency) in dependencies {
            let kind = match dependency {
                Value::Array(names) => ValidatorKind::PropertyDependency {
                    property: property.clone(),
                    requires: names
                        .iter()
                        .map(|n| {
                            n.as_str().map(String::from).ok_or_else(|| {
                                node.error(format!(
                                    "Dependencies of '{}' must be property names",
                                    property
                                ))
                            })
                        })
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                },
                Value::Object(_) => {
                    let dependency_node = child(node, &["dependencies", property.as_str()])?;
                    let mut content = dependency_node
                        .content()
                        .as_object()
                        .cloned()
                        .unwrap_or_else(Map::new);
                    if !content.contains_key("$ref") {
                        content
                            .entry("type".to_string())
                            .or_insert_with(|| Value::String("object".to_string()));
                    }
                    let dependency_node = dependency_node.with_content(Value::Object(content));
                    let schema_property = PropertyFactory::create(
                        ctx,
                        scope,
                        &none,
                        &format!("{}Dependency", property),
                        &dependency_node,
                    )?;
                    ValidatorKind::SchemaDependency {
                        property: property.clone(),
                        schema: Box::new(schema_property),
                    }
                }
                _ => {
                    return Err(node
                        .error(format!("Invalid dependency declaration for '{}'", property))
                        .into())
                }
            };
            schema.add_base_validator(Validator::new(kind));
        }
    }

    Ok(())
}

fn child(node: &SchemaNode, path: &[&str]) -> Result<SchemaNode> {
    node.navigate_path(path)
        .ok_or_else(|| node.error(format!("Missing '{}'", path.join("/"))).into())
}
