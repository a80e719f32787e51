//! Integration tests for `$ref` resolution
//!
//! These tests build models from in-memory schema documents and check that
//! references share one resolved property, that recursive schemas terminate,
//! and that failed resolutions leave the dictionary usable.

use modelgen::config::GeneratorConfig;
use modelgen::dictionary::SchemaDefinitionDictionary;
use modelgen::filters::FilterRegistry;
use modelgen::locations::Location;
use modelgen::model::{ClassRef, GeneratedModel, PropertyHandle};
use modelgen::processor::{RunContext, SchemaProcessor};
use modelgen::{Error, Evaluator, Instance, SchemaNode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::rc::Rc;

fn node(name: &str, content: Value) -> SchemaNode {
    SchemaNode::new(content, Location::String(name.into()))
}

fn build(name: &str, content: Value) -> (GeneratedModel, ClassRef) {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::with_builtins();
    let mut processor = SchemaProcessor::new(&config, &filters);
    let class = processor.process(&node(name, content)).unwrap();
    (processor.finish().unwrap(), class)
}

// ============================================================================
// Shared resolution
// ============================================================================

#[test]
fn test_same_path_resolves_to_one_property() {
    let (model, class) = build(
        "person.json",
        json!({
            "definitions": {"name": {"type": "string", "minLength": 1}},
            "properties": {
                "first": {"$ref": "#/definitions/name"},
                "last": {"$ref": "#/definitions/name"}
            },
            "required": ["last"]
        }),
    );
    let person = model.class(&class).unwrap();
    let first = person.property("first").unwrap();
    let last = person.property("last").unwrap();

    assert!(first.is_proxy() && last.is_proxy());
    assert!(std::ptr::eq(
        model.resolve(first).unwrap(),
        model.resolve(last).unwrap()
    ));

    // use-site state stays on the proxy
    assert_eq!(first.name(), "first");
    assert_eq!(last.name(), "last");
    assert!(!first.is_required());
    assert!(last.is_required());
}

#[test]
fn test_pointer_escapes_are_decoded() {
    let (model, class) = build(
        "escapes.json",
        json!({
            "definitions": {"a/b": {"type": "integer"}, "c%d": {"type": "boolean"}},
            "properties": {
                "slash": {"$ref": "#/definitions/a~1b"},
                "percent": {"$ref": "#/definitions/c%25d"}
            }
        }),
    );
    let schema = model.class(&class).unwrap();
    let slash = model.resolve(schema.property("slash").unwrap()).unwrap();
    let percent = model.resolve(schema.property("percent").unwrap()).unwrap();
    assert_eq!(slash.types(), &[modelgen::model::JsonType::Integer]);
    assert_eq!(percent.types(), &[modelgen::model::JsonType::Boolean]);
}

#[test]
fn test_reference_by_id() {
    let (model, class) = build(
        "home.json",
        json!({
            "definitions": {
                "address": {
                    "$id": "#address",
                    "type": "object",
                    "properties": {"street": {"type": "string"}}
                }
            },
            "properties": {"home": {"$ref": "#address"}}
        }),
    );
    let home = model.class(&class).unwrap().property("home").unwrap();
    let nested = home.nested_schema(model.slots()).unwrap();
    assert_eq!(nested.class_name(), "Home_Address");
    assert!(model.nested_properties(home).unwrap().contains_key("street"));
}

// ============================================================================
// Recursion
// ============================================================================

fn node_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": {"type": "integer"},
            "children": {"type": "array", "items": {"$ref": "#"}}
        },
        "required": ["value"]
    })
}

#[test]
fn test_self_reference_terminates() {
    let (model, class) = build("node.json", node_schema());

    assert_eq!(class.fqcn(), "Node");
    assert_eq!(model.len(), 1);
    assert_eq!(model.slots().pending(), 0);

    let children = model.class(&class).unwrap().property("children").unwrap();
    assert_eq!(children.type_hint(model.slots()).to_string(), "array<Node>");
    assert!(model.class(&class).unwrap().used_classes().is_empty());
}

#[test]
fn test_recursive_instance_graph() {
    let (model, class) = build("node.json", node_schema());
    let config = GeneratorConfig::new();

    let instance = Evaluator::new(&model, &config)
        .construct(&class, &json!({"value": 1, "children": [{"value": 2, "children": []}]}))
        .unwrap();

    assert_eq!(instance.class_name(), "Node");
    assert_eq!(instance.get("value"), Some(&Instance::Value(json!(1))));

    let children = instance.get("children").unwrap().as_array().unwrap();
    assert_eq!(children.len(), 1);
    let child = children[0].as_object().unwrap();
    assert_eq!(child.class_name(), "Node");
    assert_eq!(child.get("value"), Some(&Instance::Value(json!(2))));
    assert_eq!(child.get("children").unwrap().as_array().unwrap().len(), 0);
}

#[test]
fn test_recursive_instance_nested_failure() {
    let (model, class) = build("node.json", node_schema());
    let config = GeneratorConfig::new();

    let err = Evaluator::new(&model, &config)
        .construct(&class, &json!({"value": 1, "children": [{"children": []}]}))
        .unwrap_err();
    match err {
        Error::Validation(error) => {
            assert_eq!(error.path.as_deref(), Some("/children/0/value"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_mutual_recursion_through_definitions() {
    let (model, class) = build(
        "tree.json",
        json!({
            "definitions": {
                "branch": {
                    "type": "object",
                    "properties": {"leaves": {"type": "array", "items": {"$ref": "#/definitions/leaf"}}}
                },
                "leaf": {
                    "type": "object",
                    "properties": {"parent": {"$ref": "#/definitions/branch"}}
                }
            },
            "properties": {"root": {"$ref": "#/definitions/branch"}}
        }),
    );

    assert_eq!(model.slots().pending(), 0);
    let root = model.class(&class).unwrap().property("root").unwrap();
    let branch = root.nested_schema(model.slots()).unwrap().clone();
    assert!(model.class(&branch).is_some());
    assert_eq!(model.len(), 3);
}

#[test]
fn test_local_references_keep_classes_per_document() {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::new();
    let mut processor = SchemaProcessor::new(&config, &filters);

    let inner = json!({"type": "object", "properties": {"v": {"$ref": "#/definitions/v"}}});
    let a = processor
        .process(&node(
            "a.json",
            json!({"definitions": {"v": {"type": "string"}}, "properties": {"inner": inner.clone()}}),
        ))
        .unwrap();
    let b = processor
        .process(&node(
            "b.json",
            json!({"definitions": {"v": {"type": "integer"}}, "properties": {"inner": inner}}),
        ))
        .unwrap();
    let model = processor.finish().unwrap();

    let inner_class = |root: &ClassRef| {
        let handle = model.class(root).unwrap().property("inner").unwrap();
        model.resolve(handle).unwrap().nested_schema().unwrap().fqcn()
    };
    let a_inner = inner_class(&a);
    let b_inner = inner_class(&b);
    assert!(a_inner.starts_with("A_Inner"));
    assert!(b_inner.starts_with("B_Inner"));

    let evaluator = Evaluator::new(&model, &config);
    assert!(evaluator.is_valid(&a, &json!({"inner": {"v": "text"}})).unwrap());
    assert!(!evaluator.is_valid(&a, &json!({"inner": {"v": 1}})).unwrap());
    assert!(evaluator.is_valid(&b, &json!({"inner": {"v": 1}})).unwrap());
    assert!(!evaluator.is_valid(&b, &json!({"inner": {"v": "text"}})).unwrap());
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_failed_resolution_removes_cache_entry() {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::new();
    let mut ctx = RunContext::new(&config, &filters);

    let root = node(
        "defs.json",
        json!({"definitions": {"bad": {"type": "decimal"}, "good": {"type": "string"}}}),
    );
    let dictionary = Rc::new(SchemaDefinitionDictionary::build(
        &root,
        ClassRef::new("Defs", vec![]),
    ));
    let definitions = dictionary.get_definition("definitions").unwrap();

    let err = definitions
        .resolve(&mut ctx, &dictionary, "value", &["bad".to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("decimal"));
    assert_eq!(definitions.cache_len(), 0);
    assert_eq!(ctx.slots().pending(), 0);

    // a second attempt starts fresh and fails again instead of returning a proxy
    assert!(definitions
        .resolve(&mut ctx, &dictionary, "value", &["bad".to_string()])
        .is_err());

    let good = definitions
        .resolve(&mut ctx, &dictionary, "value", &["good".to_string()])
        .unwrap();
    assert!(matches!(good, PropertyHandle::Proxy(_)));
    assert_eq!(definitions.cache_len(), 1);
}

#[test]
fn test_unresolved_path_segment() {
    let config = GeneratorConfig::new();
    let filters = FilterRegistry::new();
    let mut processor = SchemaProcessor::new(&config, &filters);

    let err = processor
        .process(&node(
            "missing.json",
            json!({"definitions": {}, "properties": {"x": {"$ref": "#/definitions/nope"}}}),
        ))
        .unwrap_err();
    assert!(err.is_schema());
    assert!(err.to_string().contains("Unresolved path segment: 'nope'"));
}

// ============================================================================
// $ref with siblings
// ============================================================================

fn ref_with_sibling() -> Value {
    json!({
        "definitions": {"count": {"type": "integer", "minimum": 0}},
        "properties": {"x": {"$ref": "#/definitions/count", "maximum": 10}}
    })
}

fn explicit_all_of() -> Value {
    json!({
        "definitions": {"count": {"type": "integer", "minimum": 0}},
        "properties": {"x": {"allOf": [{"$ref": "#/definitions/count"}, {"maximum": 10}]}}
    })
}

#[test]
fn test_ref_with_sibling_normalizes_to_all_of() {
    let with_sibling = node("a.json", json!({"$ref": "#/definitions/count", "maximum": 10, "description": "x"}));
    assert_eq!(
        with_sibling.normalize().content(),
        &json!({"description": "x", "allOf": [{"$ref": "#/definitions/count"}, {"maximum": 10}]})
    );
}

#[test]
fn test_ref_with_sibling_behaves_like_all_of() {
    let config = GeneratorConfig::new();
    let (sibling_model, sibling_class) = build("a.json", ref_with_sibling());
    let (all_of_model, all_of_class) = build("b.json", explicit_all_of());
    let sibling = Evaluator::new(&sibling_model, &config);
    let all_of = Evaluator::new(&all_of_model, &config);

    for value in [json!({"x": 5}), json!({"x": -1}), json!({"x": 11}), json!({"x": "5"}), json!({})] {
        assert_eq!(
            sibling.is_valid(&sibling_class, &value).unwrap(),
            all_of.is_valid(&all_of_class, &value).unwrap(),
            "diverging result for {}",
            value
        );
    }
    assert!(sibling.is_valid(&sibling_class, &json!({"x": 5})).unwrap());
    assert!(!sibling.is_valid(&sibling_class, &json!({"x": 11})).unwrap());
}
