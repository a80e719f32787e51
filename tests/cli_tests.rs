//! CLI integration tests
//!
//! These tests verify the CLI commands work correctly by running the binary.

#![cfg(feature = "cli")]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn modelgen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modelgen"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn write_json(dir: &Path, name: &str, content: Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
    path
}

fn person_schema(dir: &Path) -> PathBuf {
    write_json(
        dir,
        "person.json",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name"],
            "additionalProperties": false
        }),
    )
}

// ============================================================================
// Inspect Command Tests
// ============================================================================

#[test]
fn test_cli_inspect_basic() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());

    let output = modelgen(&["inspect", schema.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "inspect should succeed");
    assert!(stdout.contains("modelgen v"), "should show version");
    assert!(stdout.contains("Classes: 1"), "should show class count");
    assert!(stdout.contains("name: string (required)"), "should show required member");
    assert!(stdout.contains("age: int"), "should show member type");
    assert!(stdout.contains("object validators: additionalProperties"));
}

#[test]
fn test_cli_inspect_json_output() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());

    let output = modelgen(&["inspect", "--json", schema.to_str().unwrap()]);
    assert!(output.status.success(), "inspect --json should succeed");

    let dumps: Value = serde_json::from_slice(&output.stdout).expect("should be valid JSON");
    let dumps = dumps.as_array().unwrap();
    assert_eq!(dumps.len(), 1);
    assert_eq!(dumps[0]["qualified_name"], "Person");
    assert_eq!(dumps[0]["properties"][0]["name"], "name");
    assert_eq!(dumps[0]["properties"][0]["type"], "string");
}

#[test]
fn test_cli_inspect_schema_error() {
    let dir = TempDir::new().unwrap();
    let schema = write_json(dir.path(), "bad.json", json!({"properties": {"x": {"type": "decimal"}}}));

    let output = modelgen(&["inspect", schema.to_str().unwrap()]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("decimal"));
}

// ============================================================================
// Generate Command Tests
// ============================================================================

#[test]
fn test_cli_generate() {
    let source = TempDir::new().unwrap();
    person_schema(source.path());
    let out = TempDir::new().unwrap();
    let destination = out.path().join("generated");

    let output = modelgen(&[
        "generate",
        source.path().to_str().unwrap(),
        destination.to_str().unwrap(),
        "--prefix",
        "App",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "generate should succeed");
    assert!(stdout.contains("Generated 1 classes"));
    assert!(destination.join("App/Person.json").exists());
}

#[test]
fn test_cli_generate_with_config_file() {
    let source = TempDir::new().unwrap();
    person_schema(source.path());
    let out = TempDir::new().unwrap();
    let config = write_json(out.path(), "config.json", json!({"namespacePrefix": "Cfg", "immutable": true}));
    let destination = out.path().join("generated");

    let output = modelgen(&[
        "generate",
        source.path().to_str().unwrap(),
        destination.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "generate with config should succeed");

    let dump: Value =
        serde_json::from_str(&fs::read_to_string(destination.join("Cfg/Person.json")).unwrap()).unwrap();
    assert_eq!(dump["immutable"], true);
}

#[test]
fn test_cli_generate_missing_source() {
    let out = TempDir::new().unwrap();

    let output = modelgen(&[
        "generate",
        out.path().join("nope").to_str().unwrap(),
        out.path().join("generated").to_str().unwrap(),
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("is not a directory"));
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_cli_validate_valid_document() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());
    let document = write_json(dir.path(), "ada.data", json!({"name": "Ada", "age": 36}));

    let output = modelgen(&["validate", "--schema", schema.to_str().unwrap(), document.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "validate should succeed");
    assert!(stdout.contains("Document is valid"));
}

#[test]
fn test_cli_validate_invalid_document() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());
    let document = write_json(dir.path(), "bad.data", json!({"age": -1}));

    let output = modelgen(&["validate", "--schema", schema.to_str().unwrap(), document.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Document is invalid"));
    assert!(stdout.contains("Missing required value for name"));
    assert!(!stdout.contains("age"), "only the first failure is reported");
}

#[test]
fn test_cli_validate_all_errors() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());
    let document = write_json(dir.path(), "bad.data", json!({"age": -1}));

    let output = modelgen(&[
        "validate",
        "--all",
        "--schema",
        schema.to_str().unwrap(),
        document.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Missing required value for name"));
    assert!(stdout.contains("Value for age must not be smaller than 0"));
}

#[test]
fn test_cli_validate_missing_document() {
    let dir = TempDir::new().unwrap();
    let schema = person_schema(dir.path());

    let output = modelgen(&[
        "validate",
        "--schema",
        schema.to_str().unwrap(),
        dir.path().join("missing.data").to_str().unwrap(),
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error:"));
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_cli_help() {
    let output = modelgen(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("inspect"));
    assert!(stdout.contains("validate"));
}
