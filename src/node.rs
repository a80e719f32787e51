//! Schema nodes
//!
//! A [`SchemaNode`] wraps a decoded JSON Schema fragment together with the
//! file it came from and its JSON pointer inside that file. Besides plain
//! navigation it provides the two structural operations the rest of the
//! pipeline depends on:
//!
//! - [`SchemaNode::normalize`] folds a `$ref` that has sibling validation
//!   keywords into an equivalent `allOf`, so composition handles both the
//!   ref-exclusive and the ref-plus-siblings forms.
//! - [`SchemaNode::signature`] hashes only the validation-relevant content,
//!   used to deduplicate structurally identical classes.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::SchemaError;
use crate::locations::Location;

/// Keywords that take part in the structural signature
pub const SIGNATURE_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "$ref",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "then",
    "else",
    "additionalProperties",
    "patternProperties",
    "propertyNames",
    "minProperties",
    "maxProperties",
    "dependencies",
    "items",
    "additionalItems",
    "contains",
    "minItems",
    "maxItems",
    "uniqueItems",
    "const",
    "enum",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "filter",
    "default",
];

/// Keywords whose list values have set semantics
const SET_LIKE_KEYWORDS: &[&str] = &["required", "type", "allOf", "anyOf", "oneOf"];

/// Keywords holding a single sub-schema
const SUBSCHEMA_KEYWORDS: &[&str] = &[
    "not",
    "if",
    "then",
    "else",
    "additionalProperties",
    "propertyNames",
    "contains",
    "additionalItems",
];

/// Keywords holding a map of name to sub-schema
const SCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties"];

/// Keywords holding a list of sub-schemas
const SCHEMA_LIST_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// Check whether a keyword carries validation semantics
pub fn is_relevant_keyword(keyword: &str) -> bool {
    SIGNATURE_KEYWORDS.contains(&keyword)
}

/// A decoded schema fragment plus its source location
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    content: Value,
    origin: Location,
    pointer: String,
}

impl SchemaNode {
    /// Create a root node for a decoded document
    pub fn new(content: Value, origin: Location) -> Self {
        Self {
            content,
            origin,
            pointer: "#".to_string(),
        }
    }

    /// Create a node at an explicit pointer
    pub fn at_pointer(content: Value, origin: Location, pointer: impl Into<String>) -> Self {
        Self {
            content,
            origin,
            pointer: pointer.into(),
        }
    }

    /// Replace the content, keeping origin and pointer
    pub fn with_content(&self, content: Value) -> Self {
        Self {
            content,
            origin: self.origin.clone(),
            pointer: self.pointer.clone(),
        }
    }

    /// Decoded content
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Originating file
    pub fn origin(&self) -> &Location {
        &self.origin
    }

    /// JSON pointer inside the originating file
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// `origin#/pointer`, used in error messages
    pub fn location(&self) -> String {
        let pointer = self.pointer.trim_start_matches('#');
        format!("{}#{}", self.origin, pointer)
    }

    /// Look up a keyword on an object node
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        self.content.get(keyword)
    }

    /// Check whether an object node has a keyword
    pub fn has(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    /// Check whether the content is a JSON object
    pub fn is_object(&self) -> bool {
        self.content.is_object()
    }

    /// Child node for an object key or array index
    pub fn navigate(&self, segment: &str) -> Option<SchemaNode> {
        let child = match &self.content {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        Some(Self {
            content: child.clone(),
            origin: self.origin.clone(),
            pointer: format!("{}/{}", self.pointer, escape_segment(segment)),
        })
    }

    /// Child node following several segments
    pub fn navigate_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<SchemaNode> {
        let mut current = self.clone();
        for segment in segments {
            current = current.navigate(segment.as_ref())?;
        }
        Some(current)
    }

    /// Build a schema error located at this node
    pub fn error(&self, message: impl Into<String>) -> SchemaError {
        let source = serde_json::to_string_pretty(&self.content).unwrap_or_default();
        SchemaError::new(message)
            .with_location(self.location())
            .with_source(source)
    }

    /// Fold `$ref` plus sibling validation keywords into an `allOf`.
    ///
    /// `{"$ref": R, "minLength": 2, "title": T}` becomes
    /// `{"title": T, "allOf": [{"$ref": R}, {"minLength": 2}]}`.
    /// Nodes without such siblings are returned unchanged.
    pub fn normalize(&self) -> SchemaNode {
        let Value::Object(map) = &self.content else {
            return self.clone();
        };
        let Some(reference) = map.get("$ref") else {
            return self.clone();
        };
        if !map
            .keys()
            .any(|key| key != "$ref" && is_relevant_keyword(key))
        {
            return self.clone();
        }

        let mut outer = Map::new();
        let mut siblings = Map::new();
        for (key, value) in map {
            if key == "$ref" {
                continue;
            }
            if is_relevant_keyword(key) {
                siblings.insert(key.clone(), value.clone());
            } else {
                outer.insert(key.clone(), value.clone());
            }
        }

        let mut ref_branch = Map::new();
        ref_branch.insert("$ref".to_string(), reference.clone());
        outer.insert(
            "allOf".to_string(),
            Value::Array(vec![Value::Object(ref_branch), Value::Object(siblings)]),
        );

        self.with_content(Value::Object(outer))
    }

    /// Hex SHA-256 over the validation-relevant content
    pub fn signature(&self) -> String {
        relevance_hash(&self.content)
    }

    /// Key under which structurally equal classes are shared
    ///
    /// Content holding a `$ref` is only shared within its own document,
    /// as references resolve against the document they appear in.
    pub fn dedup_key(&self) -> String {
        let signature = self.signature();
        if contains_reference(&relevant_content(&self.content)) {
            format!("{}#{}", self.origin.as_str(), signature)
        } else {
            signature
        }
    }
}

fn contains_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_reference),
        Value::Array(items) => items.iter().any(contains_reference),
        _ => false,
    }
}

/// Hex SHA-256 over the validation-relevant part of a schema
pub fn relevance_hash(value: &Value) -> String {
    let mut text = String::new();
    write_canonical(&relevant_content(value), &mut text);
    hex_digest(&text)
}

fn hex_digest(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Strip annotations from a schema position, recursing into sub-schemas
fn relevant_content(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut result = Map::new();
    for (key, value) in map {
        if !is_relevant_keyword(key) {
            continue;
        }
        let key = key.as_str();
        let stripped = if SCHEMA_MAP_KEYWORDS.contains(&key) {
            map_values(value, relevant_content)
        } else if key == "dependencies" {
            map_values(value, |dependency| match dependency {
                Value::Array(_) => sorted_list(dependency),
                _ => relevant_content(dependency),
            })
        } else if SCHEMA_LIST_KEYWORDS.contains(&key) {
            match value {
                Value::Array(items) => {
                    sorted_list(&Value::Array(items.iter().map(relevant_content).collect()))
                }
                _ => value.clone(),
            }
        } else if SUBSCHEMA_KEYWORDS.contains(&key) {
            relevant_content(value)
        } else if key == "items" {
            match value {
                // tuple positions are significant
                Value::Array(items) => Value::Array(items.iter().map(relevant_content).collect()),
                _ => relevant_content(value),
            }
        } else if key == "enum" || SET_LIKE_KEYWORDS.contains(&key) {
            sorted_list(value)
        } else {
            value.clone()
        };
        result.insert(key.to_string(), stripped);
    }

    Value::Object(result)
}

fn map_values(value: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(name, schema)| (name.clone(), f(schema)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Sort list members by their canonical text; members are not reordered internally
fn sorted_list(value: &Value) -> Value {
    let Value::Array(items) = value else {
        return value.clone();
    };
    let mut keyed: Vec<(String, Value)> = items
        .iter()
        .map(|item| {
            let mut text = String::new();
            write_canonical(item, &mut text);
            (text, item.clone())
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Value::Array(keyed.into_iter().map(|(_, item)| item).collect())
}

/// Serialize with object keys in ascending order regardless of map backing
pub(crate) fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(content: Value) -> SchemaNode {
        SchemaNode::new(content, Location::String("test.json".into()))
    }

    #[test]
    fn test_normalize_ref_with_siblings() {
        let n = node(json!({
            "$ref": "#/definitions/name",
            "minLength": 2,
            "description": "display name"
        }));
        let normalized = n.normalize();

        assert_eq!(
            normalized.content(),
            &json!({
                "description": "display name",
                "allOf": [{"$ref": "#/definitions/name"}, {"minLength": 2}]
            })
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let n = node(json!({"$ref": "#/definitions/a", "maximum": 3}));
        let once = n.normalize();
        let twice = once.normalize();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_plain_ref_untouched() {
        let n = node(json!({"$ref": "#/definitions/a", "title": "A"}));
        assert_eq!(n.normalize(), n);
    }

    #[test]
    fn test_signature_ignores_key_order_and_annotations() {
        let a = node(json!({
            "type": "object",
            "title": "A",
            "properties": {"x": {"type": "string", "description": "x"}, "y": {"type": "integer"}},
            "required": ["x", "y"]
        }));
        let b = node(json!({
            "required": ["y", "x"],
            "properties": {"y": {"type": "integer"}, "x": {"type": "string"}},
            "type": "object"
        }));
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_keeps_nested_constraints() {
        let a = node(json!({"type": "object", "properties": {"x": {"type": "string", "minLength": 1}}}));
        let b = node(json!({"type": "object", "properties": {"x": {"type": "string", "minLength": 2}}}));
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_keeps_tuple_order() {
        let a = node(json!({"type": "array", "items": [{"type": "string"}, {"type": "integer"}]}));
        let b = node(json!({"type": "array", "items": [{"type": "integer"}, {"type": "string"}]}));
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_keeps_const_list_order() {
        let a = node(json!({"const": [1, 2]}));
        let b = node(json!({"const": [2, 1]}));
        assert_ne!(a.signature(), b.signature());

        let c = node(json!({"enum": ["a", "b"]}));
        let d = node(json!({"enum": ["b", "a"]}));
        assert_eq!(c.signature(), d.signature());
    }

    #[test]
    fn test_navigate_extends_pointer() {
        let n = node(json!({"definitions": {"a/b": {"type": "string"}}}));
        let child = n.navigate_path(&["definitions", "a/b"]).unwrap();
        assert_eq!(child.pointer(), "#/definitions/a~1b");
        assert_eq!(child.location(), "test.json#/definitions/a~1b");
        assert!(n.navigate("missing").is_none());
    }

    #[test]
    fn test_relevance_hash_skips_annotations() {
        assert_eq!(
            relevance_hash(&json!({"type": "string", "description": "first"})),
            relevance_hash(&json!({"description": "second", "type": "string"}))
        );
        assert_ne!(
            relevance_hash(&json!({"type": "string"})),
            relevance_hash(&json!({"type": "integer"}))
        );
    }

    #[test]
    fn test_dedup_key_scoped_by_references() {
        let plain = json!({"type": "object", "properties": {"x": {"type": "string"}}});
        let a = SchemaNode::new(plain.clone(), Location::String("a.json".into()));
        let b = SchemaNode::new(plain, Location::String("b.json".into()));
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key(), a.signature());

        let linked = json!({"type": "object", "properties": {"x": {"$ref": "#/definitions/x"}}});
        let a = SchemaNode::new(linked.clone(), Location::String("a.json".into()));
        let b = SchemaNode::new(linked, Location::String("b.json".into()));
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.dedup_key(), b.dedup_key());
        assert!(a.dedup_key().starts_with("a.json#"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn property_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set("[a-z]{1,8}", 1..6).prop_map(|names| names.into_iter().collect())
    }

    proptest! {
        /// `required` is a set: its order never changes the signature.
        #[test]
        fn signature_ignores_required_order(names in property_names()) {
            let mut reversed = names.clone();
            reversed.reverse();
            let a = SchemaNode::new(json!({"type": "object", "required": names}), Location::String("a.json".into()));
            let b = SchemaNode::new(json!({"required": reversed, "type": "object"}), Location::String("b.json".into()));
            prop_assert_eq!(a.signature(), b.signature());
        }

        /// Annotations are not part of the signature.
        #[test]
        fn signature_ignores_annotations(text in "[ -~]{0,40}", min in 0u64..100) {
            let plain = SchemaNode::new(json!({"type": "string", "minLength": min}), Location::String("a.json".into()));
            let annotated = SchemaNode::new(
                json!({"type": "string", "minLength": min, "description": text, "title": text}),
                Location::String("a.json".into()),
            );
            prop_assert_eq!(plain.signature(), annotated.signature());
        }

        /// Validation keywords are part of the signature.
        #[test]
        fn signature_tracks_constraints(min in 0u64..100) {
            let a = SchemaNode::new(json!({"type": "string", "minLength": min}), Location::String("a.json".into()));
            let b = SchemaNode::new(json!({"type": "string", "minLength": min + 1}), Location::String("a.json".into()));
            prop_assert_ne!(a.signature(), b.signature());
        }
    }
}
