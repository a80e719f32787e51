//! Integration tests for directory-driven generation
//!
//! Schema trees are written to temporary directories, generated through the
//! dump renderer and read back.

use modelgen::render::ClassDump;
use modelgen::{DirectoryProvider, DumpRenderer, Generator, GeneratorConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_schema(root: &Path, relative: &str, content: Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn read_dump(path: &Path) -> ClassDump {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn schema_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_schema(
        dir.path(),
        "common/types.json",
        json!({"definitions": {"id": {"type": "integer", "minimum": 1}}}),
    );
    write_schema(
        dir.path(),
        "order-items/order.json",
        json!({
            "type": "object",
            "properties": {
                "id": {"$ref": "../common/types.json#/definitions/id"},
                "note": {"type": "string", "description": "Free text"}
            },
            "required": ["id"]
        }),
    );
    dir
}

// ============================================================================
// Class paths
// ============================================================================

#[test]
fn test_class_paths_follow_directories() {
    let source = schema_tree();
    let provider = DirectoryProvider::new(source.path()).unwrap();
    let model = Generator::new(GeneratorConfig::new().with_namespace_prefix("Shop"))
        .build_model(&provider)
        .unwrap();

    let names: Vec<_> = model.class_names().collect();
    assert_eq!(names, vec!["Shop.Common.Types", "Shop.OrderItems.Order"]);
}

// ============================================================================
// Generation
// ============================================================================

#[test]
fn test_generate_writes_one_file_per_class() {
    let source = schema_tree();
    let out = TempDir::new().unwrap();
    let provider = DirectoryProvider::new(source.path()).unwrap();

    let report = Generator::default()
        .generate(&provider, &DumpRenderer::new(), out.path())
        .unwrap();

    assert_eq!(report.class_count(), 2);
    assert_eq!(report.file_count(), 2);
    assert!(out.path().join("Common/Types.json").exists());

    let order = read_dump(&out.path().join("OrderItems/Order.json"));
    assert_eq!(order.qualified_name, "OrderItems.Order");
    assert_eq!(order.class_path, vec!["OrderItems"]);

    let id = &order.properties[0];
    assert_eq!(id.name, "id");
    assert_eq!(id.type_hint, "int");
    assert!(id.required);
    assert!(id.reference.is_some());
    let kinds: Vec<_> = id.validators.iter().map(|v| v.kind.as_str()).collect();
    assert!(kinds.contains(&"required"));
    assert!(kinds.contains(&"minimum"));

    let note = &order.properties[1];
    assert_eq!(note.description.as_deref(), Some("Free text"));
    assert!(!note.required);
}

#[test]
fn test_generation_is_deterministic() {
    let source = schema_tree();
    let provider = DirectoryProvider::new(source.path()).unwrap();
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();

    Generator::default()
        .generate(&provider, &DumpRenderer::new(), first.path())
        .unwrap();
    Generator::default()
        .generate(&provider, &DumpRenderer::new(), second.path())
        .unwrap();

    let relative = "OrderItems/Order.json";
    assert_eq!(
        fs::read_to_string(first.path().join(relative)).unwrap(),
        fs::read_to_string(second.path().join(relative)).unwrap()
    );
}

#[test]
fn test_immutable_flag_is_rendered() {
    let source = schema_tree();
    let out = TempDir::new().unwrap();
    let provider = DirectoryProvider::new(source.path()).unwrap();

    Generator::default()
        .generate(&provider, &DumpRenderer::new().with_immutable(true), out.path())
        .unwrap();
    assert!(read_dump(&out.path().join("Common/Types.json")).immutable);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_broken_reference_aborts_generation() {
    let source = TempDir::new().unwrap();
    write_schema(
        source.path(),
        "a.json",
        json!({"properties": {"x": {"$ref": "missing.json#/definitions/x"}}}),
    );
    let out = source.path().join("out");
    let provider = DirectoryProvider::new(source.path()).unwrap();

    let err = Generator::default()
        .generate(&provider, &DumpRenderer::new(), &out)
        .unwrap_err();
    assert!(err.to_string().contains("Unresolved reference 'missing.json#/definitions/x'"));
    assert!(!out.exists());
}

#[test]
fn test_missing_source_directory() {
    let dir = TempDir::new().unwrap();
    let err = DirectoryProvider::new(dir.path().join("nope")).unwrap_err();
    assert!(err.to_string().contains("is not a directory"));
}
