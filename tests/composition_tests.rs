//! Integration tests for the composition engine
//!
//! Models are built from in-memory schemas and executed with the reference
//! evaluator, so each combinator is checked by the values it accepts.

use modelgen::config::GeneratorConfig;
use modelgen::error::FailureKind;
use modelgen::filters::FilterRegistry;
use modelgen::locations::Location;
use modelgen::model::{ClassRef, Combinator, GeneratedModel, TypeHint};
use modelgen::processor::SchemaProcessor;
use modelgen::{Error, Evaluator, SchemaNode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::rc::Rc;

fn build(content: Value) -> (GeneratedModel, ClassRef) {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::with_builtins();
    let mut processor = SchemaProcessor::new(&config, &filters);
    let class = processor
        .process(&SchemaNode::new(content, Location::String("root.json".into())))
        .unwrap();
    (processor.finish().unwrap(), class)
}

fn build_error(content: Value) -> Error {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::with_builtins();
    let mut processor = SchemaProcessor::new(&config, &filters);
    processor
        .process(&SchemaNode::new(content, Location::String("root.json".into())))
        .unwrap_err()
}

/// Accepted / rejected per value
fn accepts(model: &GeneratedModel, class: &ClassRef, value: Value) -> bool {
    let config = GeneratorConfig::new();
    Evaluator::new(model, &config).is_valid(class, &value).unwrap()
}

fn failure(model: &GeneratedModel, class: &ClassRef, value: Value) -> FailureKind {
    let config = GeneratorConfig::new();
    match Evaluator::new(model, &config).construct(class, &value) {
        Err(Error::Validation(error)) => error.kind.unwrap(),
        other => panic!("expected a validation failure, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_missing_required_member() {
    let (model, class) = build(json!({
        "type": "object",
        "properties": {"name": {"type": "string"}},
        "required": ["name"]
    }));

    assert_eq!(failure(&model, &class, json!({})), FailureKind::Required);
    assert!(accepts(&model, &class, json!({"name": "Ada"})));
}

#[test]
fn test_one_of_counts_accepting_branches() {
    let (model, class) = build(json!({
        "properties": {"v": {"oneOf": [{"type": "string"}, {"type": "number"}]}}
    }));

    assert!(accepts(&model, &class, json!({"v": "5"})));
    assert!(accepts(&model, &class, json!({"v": 5})));
    assert_eq!(failure(&model, &class, json!({"v": true})), FailureKind::Composition);

    let v = model.class(&class).unwrap().property("v").unwrap();
    assert_eq!(v.type_hint(model.slots()).to_string(), "string|float");
}

#[test]
fn test_one_of_rejects_when_both_branches_match() {
    let (model, class) = build(json!({
        "properties": {"v": {"oneOf": [{"type": "number"}, {"type": "integer"}]}}
    }));

    assert!(!accepts(&model, &class, json!({"v": 5})));
    assert!(accepts(&model, &class, json!({"v": 5.5})));
}

#[test]
fn test_class_level_all_of_requires_every_branch() {
    let (model, class) = build(json!({
        "allOf": [{"required": ["a"]}, {"required": ["b"]}]
    }));

    assert_eq!(failure(&model, &class, json!({"a": 1})), FailureKind::Composition);

    let config = GeneratorConfig::new();
    let instance = Evaluator::new(&model, &config)
        .construct(&class, &json!({"a": 1, "b": 2}))
        .unwrap();
    assert_eq!(instance.to_value(), json!({"a": 1, "b": 2}));

    // branch members are transferred into the class without their checks
    let root = model.class(&class).unwrap();
    assert!(root.property("a").is_some() && root.property("b").is_some());
    assert!(!root.property("a").unwrap().is_required());
}

// ============================================================================
// Combinators
// ============================================================================

#[test]
fn test_all_of_any_of_on_scalars() {
    let (model, class) = build(json!({
        "properties": {
            "range": {"type": "integer", "allOf": [{"minimum": 0}, {"maximum": 10}]},
            "either": {"anyOf": [{"type": "string", "maxLength": 2}, {"type": "integer"}]}
        }
    }));

    assert!(accepts(&model, &class, json!({"range": 5})));
    assert!(!accepts(&model, &class, json!({"range": 11})));
    assert!(!accepts(&model, &class, json!({"range": -1})));

    assert!(accepts(&model, &class, json!({"either": "ab"})));
    assert!(accepts(&model, &class, json!({"either": 123})));
    assert!(!accepts(&model, &class, json!({"either": "abc"})));
}

#[test]
fn test_branches_inherit_enclosing_type() {
    let (model, class) = build(json!({
        "properties": {"code": {"type": "string", "anyOf": [{"minLength": 5}, {"pattern": "^x"}]}}
    }));

    let code = model.class(&class).unwrap().property("code").unwrap();
    let composition = model.resolve(code).unwrap().composition().unwrap();
    assert_eq!(composition.combinator, Combinator::AnyOf);
    for branch in &composition.branches {
        assert_eq!(branch.type_hint(model.slots()), TypeHint::String);
    }

    assert!(accepts(&model, &class, json!({"code": "xy"})));
    assert!(accepts(&model, &class, json!({"code": "abcdef"})));
    assert!(!accepts(&model, &class, json!({"code": "ab"})));
}

#[test]
fn test_not_forces_presence() {
    let (model, class) = build(json!({
        "properties": {"v": {"not": {"type": "string"}}}
    }));

    let v = model.class(&class).unwrap().property("v").unwrap();
    assert!(v.is_required());

    assert_eq!(failure(&model, &class, json!({})), FailureKind::Required);
    assert_eq!(failure(&model, &class, json!({"v": "text"})), FailureKind::Composition);
    assert!(accepts(&model, &class, json!({"v": 5})));
}

#[test]
fn test_any_of_objects_merge_into_one_class() {
    let (model, class) = build(json!({
        "properties": {
            "pet": {"anyOf": [
                {"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]},
                {"type": "object", "properties": {"age": {"type": "integer"}}}
            ]}
        }
    }));

    let pet = model.class(&class).unwrap().property("pet").unwrap();
    let merged = model
        .resolve(pet)
        .unwrap()
        .composition()
        .unwrap()
        .merged
        .clone()
        .unwrap();
    let merged_class = merged.nested_schema().unwrap();
    assert!(merged_class.class_name().starts_with("Root_Merged_Pet"));

    let members: Vec<_> = model.class(merged_class).unwrap().properties().keys().cloned().collect();
    assert_eq!(members, vec!["name", "age"]);
    assert_eq!(
        pet.type_hint(model.slots()),
        TypeHint::Object(merged_class.fqcn())
    );

    let config = GeneratorConfig::new();
    let instance = Evaluator::new(&model, &config)
        .construct(&class, &json!({"pet": {"name": "Rex", "age": 3}}))
        .unwrap();
    let pet = instance.get("pet").unwrap().as_object().unwrap();
    assert_eq!(pet.class_name(), merged_class.fqcn());
    assert_eq!(pet.fields().len(), 2);

    // the name branch still requires a name, the age branch accepts
    assert!(accepts(&model, &class, json!({"pet": {"age": 3}})));
    assert!(!accepts(&model, &class, json!({"pet": {"age": "old"}})));
}

#[test]
fn test_untyped_property_all_of_over_required() {
    let (model, class) = build(json!({
        "properties": {"x": {"allOf": [{"required": ["a"]}, {"required": ["b"]}]}}
    }));

    assert_eq!(failure(&model, &class, json!({"x": {"a": 1}})), FailureKind::Composition);
    assert_eq!(failure(&model, &class, json!({"x": {"b": 1}})), FailureKind::Composition);
    assert!(accepts(&model, &class, json!({"x": {"a": 1, "b": 2}})));
    // object keywords leave other values alone
    assert!(accepts(&model, &class, json!({"x": 5})));

    let x = model.class(&class).unwrap().property("x").unwrap();
    let merged = model.resolve(x).unwrap().composition().unwrap().merged.clone().unwrap();
    let members: Vec<_> = model
        .class(merged.nested_schema().unwrap())
        .unwrap()
        .properties()
        .keys()
        .cloned()
        .collect();
    assert_eq!(members, vec!["a", "b"]);
}

#[test]
fn test_one_of_objects_stay_distinct() {
    let (model, class) = build(json!({
        "properties": {
            "shape": {"oneOf": [
                {"type": "object", "properties": {"radius": {"type": "number"}}, "required": ["radius"]},
                {"type": "object", "properties": {"side": {"type": "number"}}, "required": ["side"]}
            ]}
        }
    }));

    let shape = model.class(&class).unwrap().property("shape").unwrap();
    assert!(model.resolve(shape).unwrap().composition().unwrap().merged.is_none());
    assert_eq!(shape.type_hint(model.slots()).classes().len(), 2);

    assert!(accepts(&model, &class, json!({"shape": {"radius": 1}})));
    assert!(!accepts(&model, &class, json!({"shape": {"radius": 1, "side": 2}})));
}

#[test]
fn test_identical_merges_share_one_class() {
    let (model, class) = build(json!({
        "properties": {
            "value": {"allOf": [
                {"anyOf": [
                    {"type": "object", "properties": {"a": {"type": "string"}}},
                    {"type": "object", "properties": {"b": {"type": "integer"}}}
                ]},
                {"anyOf": [
                    {"properties": {"a": {"type": "string"}}, "type": "object"},
                    {"properties": {"b": {"type": "integer"}}, "type": "object"}
                ]}
            ]}
        }
    }));

    let value = model.class(&class).unwrap().property("value").unwrap();
    let outer = model.resolve(value).unwrap().composition().unwrap();
    assert!(outer.merged.is_none());

    let merged: Vec<_> = outer
        .branches
        .iter()
        .map(|branch| {
            model
                .resolve(branch)
                .unwrap()
                .composition()
                .unwrap()
                .merged
                .clone()
                .unwrap()
        })
        .collect();
    assert!(Rc::ptr_eq(&merged[0], &merged[1]));

    let merged_classes = model
        .class_names()
        .filter(|name| name.contains("_Merged_"))
        .count();
    assert_eq!(merged_classes, 1);
    assert_eq!(model.len(), 4);
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn test_if_then_else_on_property() {
    let (model, class) = build(json!({
        "properties": {
            "code": {
                "type": "string",
                "if": {"minLength": 3},
                "then": {"pattern": "^[A-Z]+$"},
                "else": {"const": "x"}
            }
        }
    }));

    assert!(accepts(&model, &class, json!({"code": "ABC"})));
    assert!(accepts(&model, &class, json!({"code": "x"})));
    assert_eq!(failure(&model, &class, json!({"code": "abc"})), FailureKind::Conditional);
    assert_eq!(failure(&model, &class, json!({"code": "y"})), FailureKind::Conditional);
}

#[test]
fn test_if_then_on_class() {
    let (model, class) = build(json!({
        "type": "object",
        "if": {"properties": {"kind": {"const": "a"}}, "required": ["kind"]},
        "then": {"required": ["a"]}
    }));

    assert!(accepts(&model, &class, json!({"kind": "b"})));
    assert!(accepts(&model, &class, json!({"kind": "a", "a": 1})));
    assert!(!accepts(&model, &class, json!({"kind": "a"})));
}

#[test]
fn test_if_without_then_or_else_is_a_build_error() {
    let err = build_error(json!({
        "properties": {"c": {"type": "string", "if": {"minLength": 1}}}
    }));
    assert!(err.is_schema());
    assert!(err
        .to_string()
        .contains("Incomplete conditional composition: 'if' requires 'then' or 'else'"));
}

#[test]
fn test_collect_errors_reports_every_failure() {
    let (model, class) = build(json!({
        "properties": {
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["name"]
    }));

    let config = GeneratorConfig::new().with_collect_errors(true);
    match Evaluator::new(&model, &config).construct(&class, &json!({"age": -1})) {
        Err(Error::ValidationErrors(errors)) => {
            let kinds: Vec<_> = errors.iter().filter_map(|e| e.kind).collect();
            assert_eq!(kinds, vec![FailureKind::Required, FailureKind::NumericConstraint]);
        }
        other => panic!("expected collected errors, got {:?}", other.map(|_| ())),
    }
}
