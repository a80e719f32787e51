//! Identifier derivation
//!
//! This module turns JSON property names and schema content into names that
//! are valid identifiers in generated code: attribute names for properties and
//! deterministic class names for nested and merged classes.

use crate::error::{Error, Result};
use crate::node::relevance_hash;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").unwrap());

/// Length of the content hash suffix in synthesized class names
const HASH_SUFFIX_LEN: usize = 16;

/// Check if a string is a valid identifier
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Validate a class name and return an error if invalid
pub fn validate_class_name(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::schema(format!("Invalid class name: '{}'", name)))
    }
}

/// Upper-case the first character
pub fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// camelCase attribute name for a JSON property name
///
/// `"first-name"` becomes `firstName`, `"1st"` becomes `_1st`.
pub fn attribute_name(property_name: &str) -> String {
    let mut result = String::new();
    for (i, word) in property_name
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        if i == 0 {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
            }
        } else {
            result.push_str(&ucfirst(word));
        }
    }

    if result.is_empty() {
        return "property".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

/// Deterministic class name for a nested or merged class
///
/// The name depends only on the enclosing property name, the schema content,
/// the merge flag and the enclosing class name. Annotations do not take part
/// in the hash. A schema carrying an `$id` uses the id instead of the hash.
pub fn class_name(property_name: &str, content: &Value, merged: bool, current_class: &str) -> String {
    let suffix = match content.get("$id").and_then(Value::as_str) {
        Some(id) => id.replace('#', ""),
        None if current_class.is_empty() => property_name.to_string(),
        None => {
            let hash = relevance_hash(content);
            format!("{}{}", property_name, &hash[..HASH_SUFFIX_LEN])
        }
    };

    let raw = if merged {
        format!("{}_Merged_{}", current_class, ucfirst(&suffix))
    } else {
        format!("{}_{}", current_class, ucfirst(&suffix))
    };

    let cleaned = NON_WORD.replace_all(raw.trim_matches('_'), "");
    let name = ucfirst(&cleaned);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", name)
    } else {
        name
    }
}

/// Class name for a root schema: its `$id` if present, else the file stem
pub fn root_class_name(id: Option<&str>, file_stem: &str) -> String {
    let base = id
        .map(|id| {
            let trimmed = id.trim_end_matches(".json").trim_end_matches('#');
            trimmed.rsplit('/').next().unwrap_or(trimmed).to_string()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file_stem.to_string());

    let camel = attribute_name(&base);
    ucfirst(&camel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("Person"));
        assert!(is_valid_identifier("_value1"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1value"));
        assert!(!is_valid_identifier("first-name"));
    }

    #[test]
    fn test_attribute_name() {
        assert_eq!(attribute_name("name"), "name");
        assert_eq!(attribute_name("first-name"), "firstName");
        assert_eq!(attribute_name("Street Address"), "streetAddress");
        assert_eq!(attribute_name("1st"), "_1st");
        assert_eq!(attribute_name("---"), "property");
    }

    #[test]
    fn test_class_name_is_deterministic() {
        let content = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        let a = class_name("address", &content, false, "Person");
        let b = class_name("address", &content, false, "Person");
        assert_eq!(a, b);
        assert!(a.starts_with("Person_Address"));
        assert!(validate_class_name(&a).is_ok());

        let merged = class_name("address", &content, true, "Person");
        assert!(merged.starts_with("Person_Merged_Address"));
        assert_ne!(a, merged);
    }

    #[test]
    fn test_class_name_ignores_annotations() {
        let plain = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        let described = json!({
            "type": "object",
            "description": "Postal address",
            "properties": {"a": {"type": "string", "title": "Line"}}
        });
        assert_eq!(
            class_name("address", &plain, false, "Person"),
            class_name("address", &described, false, "Person")
        );

        let stricter = json!({"type": "object", "properties": {"a": {"type": "string", "minLength": 1}}});
        assert_ne!(
            class_name("address", &plain, false, "Person"),
            class_name("address", &stricter, false, "Person")
        );
    }

    #[test]
    fn test_class_name_uses_id() {
        let content = json!({"$id": "#Location", "type": "object"});
        assert_eq!(class_name("home", &content, false, "Person"), "Person_Location");
    }

    #[test]
    fn test_root_class_name() {
        assert_eq!(root_class_name(None, "person"), "Person");
        assert_eq!(root_class_name(Some("https://example.com/order-item.json"), "x"), "OrderItem");
        assert_eq!(root_class_name(Some("#Node"), "x"), "Node");
    }
}
