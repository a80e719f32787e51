//! Merged-class synthesis
//!
//! When two or more branches of an `allOf` / `anyOf` are objects, the value
//! is represented by one merged class holding the union of the branch
//! members. The members are copied with their validators cleared: each
//! branch already checked them. Merged classes are named from the property
//! name, the composition content and the enclosing class, and cached for the
//! whole run, so identical merges produce one class.

use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::factory::SchemaScope;
use crate::model::{ClassRegistry, Decorator, JsonType, Property, PropertyHandle, Schema, Validator, ValidatorKind};
use crate::names;
use crate::node::SchemaNode;
use crate::processor::RunContext;

/// Merged properties of one run, keyed by merged class name
#[derive(Debug, Default)]
pub struct MergedPropertyCache {
    entries: IndexMap<String, Rc<Property>>,
}

impl MergedPropertyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached merged property
    pub fn get(&self, class_name: &str) -> Option<&Rc<Property>> {
        self.entries.get(class_name)
    }

    /// Store a merged property
    pub fn insert(&mut self, class_name: impl Into<String>, property: Rc<Property>) {
        self.entries.insert(class_name.into(), property);
    }

    /// Number of merged classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no merge happened
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries whose class no longer exists
    pub(crate) fn retain_registered(&mut self, registry: &ClassRegistry) {
        self.entries.retain(|_, property| {
            property
                .nested_schema()
                .is_some_and(|class| registry.contains(class))
        });
    }
}

/// Merged property for the object branches of a composition
///
/// Returns the cached property when the same merge was built before.
pub fn merged_property(
    ctx: &mut RunContext<'_>,
    scope: &SchemaScope,
    name: &str,
    node: &SchemaNode,
    branches: &[PropertyHandle],
) -> Result<Option<Rc<Property>>> {
    let class_name = names::class_name(name, node.content(), true, scope.class().class_name());
    let class = scope.class().sibling(class_name);
    let key = class.fqcn();

    if let Some(cached) = ctx.merged.get(&key) {
        debug!(class = %class, "merged class cache hit");
        return Ok(Some(Rc::clone(cached)));
    }

    names::validate_class_name(class.class_name())?;
    ctx.config.limits.check_classes(ctx.registry.len() + 1)?;
    if !ctx.registry.reserve(&class, None) {
        warn!(class = %class, "merged class name already taken, not merging");
        return Ok(None);
    }

    let mut schema = Schema::new(class.clone(), node.clone(), Rc::clone(scope.dictionary()));
    for branch in branches {
        let Some(branch_class) = branch.nested_schema(&ctx.slots) else {
            continue;
        };
        match ctx.registry.get(branch_class) {
            Some(branch_schema) => {
                for member in branch_schema.properties().values() {
                    schema.add_property(member.detached());
                }
            }
            None => warn!(
                class = %class,
                branch = %branch_class,
                "branch class still under construction, members not merged"
            ),
        }
    }

    if ctx.config.output_enabled {
        info!(class = %class, properties = schema.properties().len(), "generated merged class");
    } else {
        debug!(class = %class, properties = schema.properties().len(), "generated merged class");
    }
    ctx.registry.complete(schema)?;

    let mut property = Property::new(name).with_types(vec![JsonType::Object]);
    property.add_validator(Validator::new(ValidatorKind::Type(vec![JsonType::Object])));
    property.add_decorator(Decorator::ObjectInstantiation {
        class: class.clone(),
    });
    property.set_nested_schema(class);

    let property = Rc::new(property);
    ctx.merged.insert(key, Rc::clone(&property));
    Ok(Some(property))
}
