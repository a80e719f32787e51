//! Custom constraint filters
//!
//! A filter is an extension point attached to a property with the `filter`
//! keyword. Validating filters reject values; transforming filters also
//! replace the value before it is stored. The keyword accepts a token, an
//! object `{"filter": token, ...options}` or a list of either.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};
use crate::model::{FilterCall, JsonType};
use crate::node::SchemaNode;

/// A registered filter
pub trait Filter {
    /// Token used in the `filter` keyword
    fn token(&self) -> &str;

    /// JSON type names the filter can be applied to
    fn accepted_types(&self) -> &[&str];

    /// Whether the filter replaces the value
    fn transforms(&self) -> bool {
        false
    }

    /// Apply to a value, returning the (possibly transformed) value or a reason
    fn apply(&self, value: &Value, options: &Value) -> std::result::Result<Value, String>;
}

impl fmt::Debug for dyn Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("token", &self.token())
            .field("accepted_types", &self.accepted_types())
            .finish()
    }
}

/// Strip surrounding whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimFilter;

impl Filter for TrimFilter {
    fn token(&self) -> &str {
        "trim"
    }

    fn accepted_types(&self) -> &[&str] {
        &["string"]
    }

    fn transforms(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, _options: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            other => Ok(other.clone()),
        }
    }
}

/// Lower-case a string
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseFilter;

impl Filter for LowercaseFilter {
    fn token(&self) -> &str {
        "lowercase"
    }

    fn accepted_types(&self) -> &[&str] {
        &["string"]
    }

    fn transforms(&self) -> bool {
        true
    }

    fn apply(&self, value: &Value, _options: &Value) -> std::result::Result<Value, String> {
        match value {
            Value::String(s) => Ok(Value::String(s.to_lowercase())),
            other => Ok(other.clone()),
        }
    }
}

/// Reject empty strings and arrays
///
/// With `{"filter": "notEmpty", "trim": true}` whitespace-only strings count
/// as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEmptyFilter;

impl Filter for NotEmptyFilter {
    fn token(&self) -> &str {
        "notEmpty"
    }

    fn accepted_types(&self) -> &[&str] {
        &["string", "array"]
    }

    fn apply(&self, value: &Value, options: &Value) -> std::result::Result<Value, String> {
        let trim = options.get("trim").and_then(Value::as_bool).unwrap_or(false);
        let empty = match value {
            Value::String(s) if trim => s.trim().is_empty(),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            Err("value must not be empty".to_string())
        } else {
            Ok(value.clone())
        }
    }
}

/// Filters available to a run
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: IndexMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `trim`, `notEmpty` and `lowercase`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.filters.insert("trim".to_string(), Box::new(TrimFilter));
        registry.filters.insert("notEmpty".to_string(), Box::new(NotEmptyFilter));
        registry.filters.insert("lowercase".to_string(), Box::new(LowercaseFilter));
        registry
    }

    /// Register a filter, replacing one with the same token
    pub fn register(&mut self, filter: impl Filter + 'static) -> Result<()> {
        let token = filter.token().to_string();
        if token.trim().is_empty() {
            return Err(Error::Filter("Filter token must not be empty".to_string()));
        }
        if filter.accepted_types().is_empty() {
            return Err(Error::Filter(format!(
                "Filter '{}' must accept at least one type",
                token
            )));
        }
        if let Some(unknown) = filter
            .accepted_types()
            .iter()
            .find(|name| JsonType::from_name(name).is_none())
        {
            return Err(Error::Filter(format!(
                "Filter '{}' declares unsupported accepted type '{}'",
                token, unknown
            )));
        }
        self.filters.insert(token, Box::new(filter));
        Ok(())
    }

    /// Look up a filter by token
    pub fn get(&self, token: &str) -> Option<&dyn Filter> {
        self.filters.get(token).map(|f| f.as_ref())
    }

    /// Registered tokens
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Whether a filter accepts values of a type
    pub fn accepts(&self, token: &str, json_type: JsonType) -> bool {
        self.get(token).is_some_and(|filter| {
            filter.accepted_types().iter().any(|name| match JsonType::from_name(name) {
                Some(JsonType::Number) => json_type == JsonType::Number || json_type == JsonType::Integer,
                Some(accepted) => accepted == json_type,
                None => false,
            })
        })
    }

    /// Parse the `filter` keyword of a node declaring `types`
    pub fn calls_for(&self, node: &SchemaNode, types: &[JsonType]) -> Result<Vec<FilterCall>> {
        let Some(keyword) = node.get("filter") else {
            return Ok(Vec::new());
        };
        let entries: Vec<&Value> = match keyword {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut calls = Vec::new();
        for entry in entries {
            let (token, options) = match entry {
                Value::String(token) => (token.clone(), Value::Object(Map::new())),
                Value::Object(map) => {
                    let token = map
                        .get("filter")
                        .and_then(Value::as_str)
                        .ok_or_else(|| node.error("Filter object requires a 'filter' token"))?;
                    let mut options = map.clone();
                    options.remove("filter");
                    (token.to_string(), Value::Object(options))
                }
                _ => return Err(node.error("Invalid filter declaration").into()),
            };

            let filter = self
                .get(&token)
                .ok_or_else(|| node.error(format!("Unsupported filter '{}'", token)))?;
            if let Some(rejected) = types
                .iter()
                .find(|t| **t != JsonType::Null && !self.accepts(&token, **t))
            {
                return Err(node
                    .error(format!(
                        "Filter '{}' is not compatible with property type '{}'",
                        token, rejected
                    ))
                    .into());
            }

            calls.push(FilterCall {
                token,
                options,
                transforms: filter.transforms(),
            });
        }
        Ok(calls)
    }
}
