//! JSON class descriptions
//!
//! [`DumpRenderer`] serializes each class into a [`ClassDump`]: members with
//! their type hints, decorators and validators, plus the object-level
//! validators and the classes the class depends on. Output is stable across
//! runs for identical input, so dumps can be compared as golden files.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{RenderedClass, Renderer};
use crate::error::RenderError;
use crate::model::{
    AdditionalItems, AdditionalProperties, GeneratedModel, PropertyHandle, PropertySlots, Schema,
    Validator, ValidatorKind,
};

/// Class description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassDump {
    /// Class name
    pub class_name: String,

    /// Fully-qualified class name
    pub qualified_name: String,

    /// Namespace segments
    pub class_path: Vec<String>,

    /// Whether setters are omitted
    pub immutable: bool,

    /// Origin file and pointer of the class schema
    pub source: String,

    /// Declared members
    pub properties: Vec<PropertyDump>,

    /// Object-level validators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_validators: Vec<ValidatorDump>,

    /// Fully-qualified names of referenced classes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_classes: Vec<String>,
}

/// Member description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyDump {
    /// JSON name
    pub name: String,

    /// Generated accessor name
    pub attribute_name: String,

    /// Declared type (e.g. `string|null`, `array<App.Node>`)
    #[serde(rename = "type")]
    pub type_hint: String,

    /// Whether a value must be present
    pub required: bool,

    /// Reference key when the member is a resolved reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Nested class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_class: Option<String>,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Format annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Assignment expression for a value named `$value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,

    /// Checks in execution order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidatorDump>,
}

/// Validator description
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorDump {
    /// Keyword-style name
    pub kind: String,

    /// Execution priority
    pub priority: u32,

    /// Parameters of the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Sub-properties (items, branches, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<PropertyDump>,
}

/// Writes one `.json` class description per class
#[derive(Debug, Clone, Default)]
pub struct DumpRenderer {
    immutable: bool,
}

impl DumpRenderer {
    /// Create a renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark classes as immutable
    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Build the description of a class
    pub fn dump(&self, schema: &Schema, model: &GeneratedModel) -> Result<ClassDump, RenderError> {
        let slots = model.slots();
        let fail = |e: crate::error::Error| RenderError::new(schema.class().fqcn(), e.to_string());

        let properties = schema
            .properties()
            .values()
            .map(|handle| property_dump(handle, slots, 0))
            .collect::<crate::error::Result<Vec<_>>>()
            .map_err(fail)?;
        let base_validators = schema
            .base_validators()
            .iter()
            .map(|validator| validator_dump(validator, slots, 1))
            .collect::<crate::error::Result<Vec<_>>>()
            .map_err(fail)?;

        Ok(ClassDump {
            class_name: schema.class_name().to_string(),
            qualified_name: schema.class().fqcn(),
            class_path: schema.class_path().to_vec(),
            immutable: self.immutable,
            source: schema.node().location(),
            properties,
            base_validators,
            used_classes: schema.used_classes().iter().map(|c| c.fqcn()).collect(),
        })
    }
}

impl Renderer for DumpRenderer {
    fn file_extension(&self) -> &str {
        "json"
    }

    fn render(&self, schema: &Schema, model: &GeneratedModel) -> Result<RenderedClass, RenderError> {
        let dump = self.dump(schema, model)?;
        let content = serde_json::to_string_pretty(&dump)
            .map_err(|e| RenderError::new(schema.class().fqcn(), e.to_string()))?;
        Ok(RenderedClass::new(
            schema.class().clone(),
            self.file_extension(),
            content + "\n",
        ))
    }
}

/// Nested proxies are not expanded: every cycle in the model passes through one
fn property_dump(
    handle: &PropertyHandle,
    slots: &PropertySlots,
    depth: usize,
) -> crate::error::Result<PropertyDump> {
    let property = handle.resolve(slots)?;
    let reference = match handle {
        PropertyHandle::Proxy(proxy) => Some(proxy.key().to_string()),
        PropertyHandle::Owned(_) => None,
    };

    let validators = if reference.is_some() && depth > 0 {
        Vec::new()
    } else {
        handle
            .validators(slots)?
            .into_iter()
            .map(|validator| validator_dump(validator, slots, depth + 1))
            .collect::<crate::error::Result<Vec<_>>>()?
    };

    Ok(PropertyDump {
        name: handle.name().to_string(),
        attribute_name: handle.attribute_name().to_string(),
        type_hint: handle.type_hint(slots).to_string(),
        required: handle.is_required(),
        reference,
        nested_class: property.nested_schema().map(|c| c.fqcn()),
        description: handle.description(slots).map(str::to_string),
        default: property.default_value().cloned(),
        format: property.format().map(str::to_string),
        decorators: handle
            .effective_decorators(slots)
            .iter()
            .map(|d| d.decorate("$value"))
            .collect(),
        validators,
    })
}

fn validator_dump(
    validator: &Validator,
    slots: &PropertySlots,
    depth: usize,
) -> crate::error::Result<ValidatorDump> {
    let nested = validator
        .kind
        .nested_properties()
        .into_iter()
        .map(|handle| property_dump(handle, slots, depth))
        .collect::<crate::error::Result<Vec<_>>>()?;

    Ok(ValidatorDump {
        kind: validator.kind.name().to_string(),
        priority: validator.priority,
        value: validator_value(&validator.kind),
        nested,
    })
}

fn validator_value(kind: &ValidatorKind) -> Option<Value> {
    let value = match kind {
        ValidatorKind::Required | ValidatorKind::UniqueItems => return None,
        ValidatorKind::Type(types) => json!(types.iter().map(|t| t.as_str()).collect::<Vec<_>>()),
        ValidatorKind::Const(value) => value.clone(),
        ValidatorKind::Enum(values) => Value::Array(values.clone()),
        ValidatorKind::MinLength(n)
        | ValidatorKind::MaxLength(n)
        | ValidatorKind::MinItems(n)
        | ValidatorKind::MaxItems(n)
        | ValidatorKind::MinProperties(n)
        | ValidatorKind::MaxProperties(n) => json!(n),
        ValidatorKind::Pattern(pattern) => json!(pattern),
        ValidatorKind::Minimum(n)
        | ValidatorKind::Maximum(n)
        | ValidatorKind::ExclusiveMinimum(n)
        | ValidatorKind::ExclusiveMaximum(n)
        | ValidatorKind::MultipleOf(n) => json!(n),
        ValidatorKind::Items(_) | ValidatorKind::Contains(_) | ValidatorKind::PropertyNames(_) => {
            return None
        }
        ValidatorKind::TupleItems { items, additional } => json!({
            "positions": items.len(),
            "additional": match additional {
                AdditionalItems::Allowed => "allowed",
                AdditionalItems::Forbidden => "forbidden",
                AdditionalItems::Schema(_) => "schema",
            },
        }),
        ValidatorKind::AdditionalProperties(additional) => match additional {
            AdditionalProperties::Forbidden => json!(false),
            AdditionalProperties::Schema(_) => json!("schema"),
        },
        ValidatorKind::PatternProperties(entries) => json!(entries
            .iter()
            .map(|e| json!({"pattern": e.pattern, "key": e.key}))
            .collect::<Vec<_>>()),
        ValidatorKind::PropertyDependency { property, requires } => {
            json!({"property": property, "requires": requires})
        }
        ValidatorKind::SchemaDependency { property, .. } => json!({"property": property}),
        ValidatorKind::Filter(call) => json!({
            "token": call.token,
            "options": call.options,
            "transforms": call.transforms,
        }),
        ValidatorKind::Composition(composition) => json!({
            "branches": composition.len(),
            "merged": composition
                .merged
                .as_ref()
                .and_then(|m| m.nested_schema())
                .map(|c| c.fqcn()),
        }),
        ValidatorKind::Conditional(conditional) => json!({
            "then": conditional.then_branch.is_some(),
            "else": conditional.else_branch.is_some(),
        }),
    };
    Some(value)
}
