//! Reference evaluator
//!
//! Generation never looks at instance data. This module interprets a
//! finished [`GeneratedModel`] the way generated classes behave at their own
//! runtime, which makes the model checkable in tests and previews:
//!
//! 1. object-level (base) validators run against the whole input,
//! 2. each member runs its validators in priority order, optional members
//!    accept `null` without validation when implicit null is enabled,
//! 3. defaults are applied and values are converted into nested instances.
//!
//! Composition validators count accepting branches and compare with the
//! combinator; conditionals apply `then` or `else` depending on `if`.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::GeneratorConfig;
use crate::error::{Error, FailureKind, Result, ValidationError, ValidationErrors};
use crate::filters::{Filter, FilterRegistry};
use crate::model::{
    AdditionalItems, AdditionalProperties, ClassRef, GeneratedModel, JsonType, PatternProperty,
    Property, PropertyHandle, Schema, ValidatorKind,
};

/// Converted value of a member
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    /// Plain JSON value
    Value(Value),
    /// Array of converted items
    Array(Vec<Instance>),
    /// Instance of a generated class
    Object(ObjectInstance),
}

impl Instance {
    /// Nested object instance, if any
    pub fn as_object(&self) -> Option<&ObjectInstance> {
        match self {
            Instance::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Converted items, if an array
    pub fn as_array(&self) -> Option<&[Instance]> {
        match self {
            Instance::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Back to JSON
    pub fn to_value(&self) -> Value {
        match self {
            Instance::Value(value) => value.clone(),
            Instance::Array(items) => Value::Array(items.iter().map(Instance::to_value).collect()),
            Instance::Object(object) => object.to_value(),
        }
    }
}

/// Constructed instance of a generated class
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInstance {
    class_name: String,
    fields: IndexMap<String, Instance>,
    additional: IndexMap<String, Value>,
}

impl ObjectInstance {
    fn new(class_name: String) -> Self {
        Self {
            class_name,
            fields: IndexMap::new(),
            additional: IndexMap::new(),
        }
    }

    /// Fully-qualified class name
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Declared members that received a value
    pub fn fields(&self) -> &IndexMap<String, Instance> {
        &self.fields
    }

    /// Member by JSON name
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.fields.get(name)
    }

    /// Undeclared members
    pub fn additional(&self) -> &IndexMap<String, Value> {
        &self.additional
    }

    /// Back to JSON
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_value());
        }
        for (name, value) in &self.additional {
            map.insert(name.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Outcome of one check
enum Verdict {
    Pass,
    Replace(Value),
    Reject(Vec<ValidationError>),
}

/// Interprets a model against instance data
pub struct Evaluator<'m> {
    model: &'m GeneratedModel,
    config: &'m GeneratorConfig,
    filters: Option<&'m FilterRegistry>,
    builtin_filters: FilterRegistry,
}

impl<'m> Evaluator<'m> {
    /// Create an evaluator using the built-in filters
    pub fn new(model: &'m GeneratedModel, config: &'m GeneratorConfig) -> Self {
        Self {
            model,
            config,
            filters: None,
            builtin_filters: FilterRegistry::with_builtins(),
        }
    }

    /// Use the filters the model was generated with
    pub fn with_filters(mut self, filters: &'m FilterRegistry) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Construct an instance of `class` from `value`
    ///
    /// Returns [`Error::Validation`] on the first failure, or
    /// [`Error::ValidationErrors`] with every failure when error collection
    /// is enabled.
    pub fn construct(&self, class: &ClassRef, value: &Value) -> Result<ObjectInstance> {
        let schema = self.model.require_class(class)?;
        let mut errors = Vec::new();
        let instance = self.construct_class(schema, value, "", &mut errors)?;
        match instance {
            Some(instance) if errors.is_empty() => Ok(instance),
            _ => Err(self.into_error(errors)),
        }
    }

    /// Check whether `value` is accepted by `class`
    pub fn is_valid(&self, class: &ClassRef, value: &Value) -> Result<bool> {
        match self.construct(class, value) {
            Ok(_) => Ok(true),
            Err(Error::Validation(_)) | Err(Error::ValidationErrors(_)) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn into_error(&self, mut errors: Vec<ValidationError>) -> Error {
        if errors.is_empty() {
            return Error::Validation(ValidationError::new("Value rejected"));
        }
        if self.config.collect_errors && errors.len() > 1 {
            let mut collected = ValidationErrors::new();
            for error in errors {
                collected.push(error);
            }
            Error::ValidationErrors(collected)
        } else {
            Error::Validation(errors.remove(0))
        }
    }

    fn stop(&self, errors: &[ValidationError]) -> bool {
        !errors.is_empty() && !self.config.collect_errors
    }

    fn construct_class(
        &self,
        schema: &Schema,
        value: &Value,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Option<ObjectInstance>> {
        let Value::Object(bag) = value else {
            errors.push(failure(
                FailureKind::InvalidType,
                path,
                format!(
                    "Invalid type for {}: expected object, got {}",
                    display_path(path),
                    JsonType::of(value)
                ),
            ));
            return Ok(None);
        };
        let start = errors.len();

        for validator in schema.base_validators() {
            match self.check_object(schema, &validator.kind, bag, value, path)? {
                Verdict::Reject(found) => errors.extend(found),
                Verdict::Pass | Verdict::Replace(_) => {}
            }
            if self.stop(errors) {
                return Ok(None);
            }
        }

        let mut instance = ObjectInstance::new(schema.class().fqcn());
        for (name, handle) in schema.properties() {
            let member_path = join_path(path, name);
            let before = errors.len();
            let converted = self.check_property(handle, bag.get(name), &member_path, true, errors)?;
            if errors.len() > before {
                if self.stop(errors) {
                    return Ok(None);
                }
                continue;
            }
            if let Some(converted) = converted {
                instance.fields.insert(name.clone(), converted);
            }
        }

        for (name, value) in bag {
            if !schema.properties().contains_key(name) {
                instance.additional.insert(name.clone(), value.clone());
            }
        }

        Ok((errors.len() == start).then_some(instance))
    }

    /// Validate and convert one member value
    fn check_property(
        &self,
        handle: &PropertyHandle,
        value: Option<&Value>,
        path: &str,
        implicit_null: bool,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Option<Instance>> {
        let slots = self.model.slots();
        let property = handle.resolve(slots)?;
        let required = handle.is_required();

        let mut value = match value.or_else(|| handle.default_value(slots)) {
            Some(value) => value.clone(),
            None => {
                if required {
                    errors.push(failure(
                        FailureKind::Required,
                        path,
                        format!("Missing required value for {}", display_path(path)),
                    ));
                }
                return Ok(None);
            }
        };

        if value.is_null() && implicit_null && self.config.implicit_null && !required {
            return Ok(Some(Instance::Value(Value::Null)));
        }

        for validator in handle.validators(slots)? {
            match self.check_value(&validator.kind, &value, path)? {
                Verdict::Pass => {}
                Verdict::Replace(replaced) => value = replaced,
                Verdict::Reject(found) => {
                    errors.extend(found);
                    return Ok(None);
                }
            }
        }

        self.convert(property, value, path, errors).map(Some)
    }

    /// Whether a branch accepts a value, without null shortcut
    fn accepts(&self, branch: &PropertyHandle, value: &Value, path: &str) -> Result<bool> {
        let mut errors = Vec::new();
        self.check_property(branch, Some(value), path, false, &mut errors)?;
        Ok(errors.is_empty())
    }

    fn convert(
        &self,
        property: &Property,
        value: Value,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Instance> {
        if !value.is_object() && !value.is_array() {
            return Ok(Instance::Value(value));
        }

        if let Some(class) = property.nested_schema().filter(|_| value.is_object()) {
            return self.instantiate(class, &value, path, errors);
        }

        if let Value::Array(items) = &value {
            for validator in property.validators() {
                let item = match &validator.kind {
                    ValidatorKind::Items(item) => item,
                    _ => continue,
                };
                let item = item.resolve(self.model.slots())?;
                let mut converted = Vec::with_capacity(items.len());
                for (index, element) in items.iter().enumerate() {
                    let element_path = join_path(path, &index.to_string());
                    converted.push(self.convert(item, element.clone(), &element_path, errors)?);
                }
                return Ok(Instance::Array(converted));
            }
            return Ok(Instance::Value(value));
        }

        if let Some(composition) = property.composition() {
            if let Some(class) = composition.merged.as_ref().and_then(|m| m.nested_schema()) {
                return self.instantiate(class, &value, path, errors);
            }
            for branch in &composition.branches {
                let Some(class) = branch.nested_schema(self.model.slots()) else {
                    continue;
                };
                if self.accepts(branch, &value, path)? {
                    return self.instantiate(class, &value, path, errors);
                }
            }
        }

        Ok(Instance::Value(value))
    }

    fn instantiate(
        &self,
        class: &ClassRef,
        value: &Value,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Instance> {
        let schema = self.model.require_class(class)?;
        match self.construct_class(schema, value, path, errors)? {
            Some(instance) => Ok(Instance::Object(instance)),
            None => Ok(Instance::Value(value.clone())),
        }
    }

    /// Object-level checks need the declared members of the class
    fn check_object(
        &self,
        schema: &Schema,
        kind: &ValidatorKind,
        bag: &Map<String, Value>,
        value: &Value,
        path: &str,
    ) -> Result<Verdict> {
        let reject = |message: String| Ok(Verdict::Reject(vec![failure(kind.failure_kind(), path, message)]));

        match kind {
            ValidatorKind::AdditionalProperties(additional) => {
                let patterns = pattern_entries(schema);
                let mut nested = Vec::new();
                for (name, member) in bag {
                    if schema.properties().contains_key(name) || matches_any(&patterns, name)? {
                        continue;
                    }
                    match additional {
                        AdditionalProperties::Forbidden => {
                            return reject(format!(
                                "Unexpected property '{}' in {}",
                                name,
                                display_path(path)
                            ))
                        }
                        AdditionalProperties::Schema(property) => {
                            self.check_property(property, Some(member), &join_path(path, name), false, &mut nested)?;
                        }
                    }
                }
                Ok(verdict(nested))
            }
            ValidatorKind::PatternProperties(entries) => {
                let mut nested = Vec::new();
                for (name, member) in bag {
                    for entry in entries {
                        if compile(&entry.pattern)?.is_match(name) {
                            self.check_property(&entry.property, Some(member), &join_path(path, name), false, &mut nested)?;
                        }
                    }
                }
                Ok(verdict(nested))
            }
            ValidatorKind::PropertyNames(names) => {
                let mut nested = Vec::new();
                for name in bag.keys() {
                    self.check_property(names, Some(&Value::String(name.clone())), &join_path(path, name), false, &mut nested)?;
                }
                Ok(verdict(nested))
            }
            ValidatorKind::MinProperties(min) if (bag.len() as u64) < *min => reject(format!(
                "{} must have at least {} properties",
                display_path(path),
                min
            )),
            ValidatorKind::MaxProperties(max) if (bag.len() as u64) > *max => reject(format!(
                "{} must have at most {} properties",
                display_path(path),
                max
            )),
            ValidatorKind::PropertyDependency { property, requires } if bag.contains_key(property) => {
                match requires.iter().find(|name| !bag.contains_key(name.as_str())) {
                    Some(missing) => reject(format!(
                        "Property '{}' requires '{}' in {}",
                        property,
                        missing,
                        display_path(path)
                    )),
                    None => Ok(Verdict::Pass),
                }
            }
            ValidatorKind::SchemaDependency { property, schema: dependency } if bag.contains_key(property) => {
                if self.accepts(dependency, value, path)? {
                    Ok(Verdict::Pass)
                } else {
                    reject(format!(
                        "Dependency schema of '{}' rejected {}",
                        property,
                        display_path(path)
                    ))
                }
            }
            ValidatorKind::MinProperties(_)
            | ValidatorKind::MaxProperties(_)
            | ValidatorKind::PropertyDependency { .. }
            | ValidatorKind::SchemaDependency { .. } => Ok(Verdict::Pass),
            other => self.check_value(other, value, path),
        }
    }

    /// Checks that only need the value itself
    fn check_value(&self, kind: &ValidatorKind, value: &Value, path: &str) -> Result<Verdict> {
        let reject = |message: String| Ok(Verdict::Reject(vec![failure(kind.failure_kind(), path, message)]));
        let at = display_path(path);

        match kind {
            ValidatorKind::Required => Ok(Verdict::Pass),
            ValidatorKind::Type(types) => {
                if types.iter().any(|t| t.matches(value)) {
                    Ok(Verdict::Pass)
                } else {
                    let expected: Vec<_> = types.iter().map(JsonType::as_str).collect();
                    reject(format!(
                        "Invalid type for {}: expected {}, got {}",
                        at,
                        expected.join("|"),
                        JsonType::of(value)
                    ))
                }
            }
            ValidatorKind::Const(expected) if !values_equal(expected, value) => {
                reject(format!("Invalid value for {}: expected {}", at, expected))
            }
            ValidatorKind::Enum(members) if !members.iter().any(|m| values_equal(m, value)) => {
                reject(format!("Invalid value for {}: not in enumeration", at))
            }
            ValidatorKind::MinLength(min) => match value.as_str() {
                Some(s) if (s.chars().count() as u64) < *min => {
                    reject(format!("Value for {} must not be shorter than {}", at, min))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::MaxLength(max) => match value.as_str() {
                Some(s) if (s.chars().count() as u64) > *max => {
                    reject(format!("Value for {} must not be longer than {}", at, max))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::Pattern(pattern) => match value.as_str() {
                Some(s) if !compile(pattern)?.is_match(s) => {
                    reject(format!("Value for {} doesn't match pattern {}", at, pattern))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::Minimum(min) => numeric(value, |n| n >= *min, || {
                reject(format!("Value for {} must not be smaller than {}", at, min))
            }),
            ValidatorKind::Maximum(max) => numeric(value, |n| n <= *max, || {
                reject(format!("Value for {} must not be larger than {}", at, max))
            }),
            ValidatorKind::ExclusiveMinimum(min) => numeric(value, |n| n > *min, || {
                reject(format!("Value for {} must be larger than {}", at, min))
            }),
            ValidatorKind::ExclusiveMaximum(max) => numeric(value, |n| n < *max, || {
                reject(format!("Value for {} must be smaller than {}", at, max))
            }),
            ValidatorKind::MultipleOf(factor) => numeric(
                value,
                |n| {
                    let quotient = n / *factor;
                    (quotient - quotient.round()).abs() < 1e-9
                },
                || reject(format!("Value for {} must be a multiple of {}", at, factor)),
            ),
            ValidatorKind::MinItems(min) => match value.as_array() {
                Some(items) if (items.len() as u64) < *min => {
                    reject(format!("{} must contain at least {} items", at, min))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::MaxItems(max) => match value.as_array() {
                Some(items) if (items.len() as u64) > *max => {
                    reject(format!("{} must not contain more than {} items", at, max))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::UniqueItems => match value.as_array() {
                Some(items)
                    if items
                        .iter()
                        .enumerate()
                        .any(|(i, a)| items[i + 1..].iter().any(|b| values_equal(a, b))) =>
                {
                    reject(format!("{} contains duplicate items", at))
                }
                _ => Ok(Verdict::Pass),
            },
            ValidatorKind::Items(item) => {
                let Some(items) = value.as_array() else {
                    return Ok(Verdict::Pass);
                };
                let mut nested = Vec::new();
                for (index, element) in items.iter().enumerate() {
                    self.check_property(item, Some(element), &join_path(path, &index.to_string()), false, &mut nested)?;
                }
                Ok(verdict(nested))
            }
            ValidatorKind::TupleItems { items: tuple, additional } => {
                let Some(items) = value.as_array() else {
                    return Ok(Verdict::Pass);
                };
                let mut nested = Vec::new();
                for (index, element) in items.iter().enumerate() {
                    let element_path = join_path(path, &index.to_string());
                    match (tuple.get(index), additional) {
                        (Some(position), _) => {
                            self.check_property(position, Some(element), &element_path, false, &mut nested)?;
                        }
                        (None, AdditionalItems::Forbidden) => {
                            return reject(format!(
                                "{} must not contain more than {} items",
                                at,
                                tuple.len()
                            ))
                        }
                        (None, AdditionalItems::Schema(schema)) => {
                            self.check_property(schema, Some(element), &element_path, false, &mut nested)?;
                        }
                        (None, AdditionalItems::Allowed) => {}
                    }
                }
                Ok(verdict(nested))
            }
            ValidatorKind::Contains(item) => {
                let Some(items) = value.as_array() else {
                    return Ok(Verdict::Pass);
                };
                for (index, element) in items.iter().enumerate() {
                    if self.accepts(item, element, &join_path(path, &index.to_string()))? {
                        return Ok(Verdict::Pass);
                    }
                }
                reject(format!("{} must contain an item matching the contains schema", at))
            }
            ValidatorKind::Filter(call) => {
                let Some(filter) = self.filter(&call.token) else {
                    return Err(Error::Filter(format!("Unknown filter '{}'", call.token)));
                };
                if !self.filter_accepts(filter, value) {
                    return Ok(Verdict::Pass);
                }
                match filter.apply(value, &call.options) {
                    Ok(filtered) if call.transforms => Ok(Verdict::Replace(filtered)),
                    Ok(_) => Ok(Verdict::Pass),
                    Err(reason) => Ok(Verdict::Reject(vec![failure(
                        FailureKind::Filter,
                        path,
                        format!("Invalid value for {} rejected by filter {}", at, call.token),
                    )
                    .with_reason(reason)])),
                }
            }
            ValidatorKind::Composition(composition) => {
                let mut accepted = 0;
                for branch in &composition.branches {
                    if self.accepts(branch, value, path)? {
                        accepted += 1;
                    }
                }
                if composition.combinator.accepts(accepted, composition.len()) {
                    Ok(Verdict::Pass)
                } else {
                    reject(format!(
                        "Invalid value for {} declined by composition constraint ({}): {} of {} branches accepted",
                        at,
                        composition.combinator.keyword(),
                        accepted,
                        composition.len()
                    ))
                }
            }
            ValidatorKind::Conditional(conditional) => {
                let branch = if self.accepts(&conditional.if_branch, value, path)? {
                    conditional.then_branch.as_ref().map(|b| ("then", b))
                } else {
                    conditional.else_branch.as_ref().map(|b| ("else", b))
                };
                let Some((keyword, branch)) = branch else {
                    return Ok(Verdict::Pass);
                };
                if self.accepts(branch, value, path)? {
                    Ok(Verdict::Pass)
                } else {
                    reject(format!(
                        "Invalid value for {} declined by conditional composition constraint ({})",
                        at, keyword
                    ))
                }
            }
            // object-level checks only apply through check_object
            _ => Ok(Verdict::Pass),
        }
    }

    fn filter(&self, token: &str) -> Option<&dyn Filter> {
        self.filters
            .and_then(|filters| filters.get(token))
            .or_else(|| self.builtin_filters.get(token))
    }

    fn filter_accepts(&self, filter: &dyn Filter, value: &Value) -> bool {
        let json_type = JsonType::of(value);
        filter.accepted_types().iter().any(|name| match JsonType::from_name(name) {
            Some(JsonType::Number) => value.is_number(),
            Some(accepted) => accepted == json_type,
            None => false,
        })
    }
}

fn failure(kind: FailureKind, path: &str, message: String) -> ValidationError {
    ValidationError::new(message)
        .with_kind(kind)
        .with_path(if path.is_empty() { "/" } else { path })
}

fn verdict(errors: Vec<ValidationError>) -> Verdict {
    if errors.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Reject(errors)
    }
}

fn numeric(
    value: &Value,
    check: impl Fn(f64) -> bool,
    reject: impl FnOnce() -> Result<Verdict>,
) -> Result<Verdict> {
    match value.as_f64() {
        Some(n) if !check(n) => reject(),
        _ => Ok(Verdict::Pass),
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::schema(format!("Invalid pattern '{}': {}", pattern, e)))
}

fn pattern_entries(schema: &Schema) -> Vec<&PatternProperty> {
    schema
        .base_validators()
        .iter()
        .filter_map(|v| match &v.kind {
            ValidatorKind::PatternProperties(entries) => Some(entries.iter()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn matches_any(patterns: &[&PatternProperty], name: &str) -> Result<bool> {
    for entry in patterns {
        if compile(&entry.pattern)?.is_match(name) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// JSON equality treating `1` and `1.0` as equal
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, a)| y.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

fn join_path(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment.replace('~', "~0").replace('/', "~1"))
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "object".to_string()
    } else {
        path.trim_start_matches('/').to_string()
    }
}
