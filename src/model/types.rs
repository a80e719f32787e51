//! Type tags and type hints
//!
//! [`JsonType`] is the closed set of JSON value types a type check can
//! accept. [`TypeHint`] is the externally visible type of a property as a
//! renderer would declare it.

use serde_json::Value;
use std::fmt;

/// JSON value type accepted by a type check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JsonType {
    /// JSON string
    String,
    /// JSON number without fractional part
    Integer,
    /// Any JSON number
    Number,
    /// true / false
    Boolean,
    /// null
    Null,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl JsonType {
    /// Parse a JSON Schema type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(JsonType::String),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "boolean" => Some(JsonType::Boolean),
            "null" => Some(JsonType::Null),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    /// JSON Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Type of a concrete JSON value (integers report as Integer)
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => JsonType::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
            Value::Number(n) if n.as_f64().is_some_and(|f| f.fract() == 0.0) => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::Bool(_) => JsonType::Boolean,
            Value::Null => JsonType::Null,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    /// Check whether a value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            JsonType::Number => value.is_number(),
            other => *other == JsonType::of(value),
        }
    }

    /// Primitive types may appear in a multi-type list
    pub fn is_primitive(&self) -> bool {
        !matches!(self, JsonType::Array | JsonType::Object)
    }

    /// Type hint for a primitive type
    pub fn hint(&self) -> TypeHint {
        match self {
            JsonType::String => TypeHint::String,
            JsonType::Integer => TypeHint::Integer,
            JsonType::Number => TypeHint::Number,
            JsonType::Boolean => TypeHint::Boolean,
            JsonType::Null => TypeHint::Null,
            JsonType::Array => TypeHint::Array(Box::new(TypeHint::Any)),
            JsonType::Object => TypeHint::Any,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible type of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHint {
    /// string
    String,
    /// integer
    Integer,
    /// float
    Number,
    /// bool
    Boolean,
    /// null
    Null,
    /// Array with item type
    Array(Box<TypeHint>),
    /// Generated class (fully-qualified name)
    Object(String),
    /// Untyped
    Any,
    /// One of several types
    Union(Vec<TypeHint>),
}

impl TypeHint {
    /// Union of several hints, flattened and deduplicated
    ///
    /// A union containing `Any` collapses to `Any`; a single member collapses
    /// to itself.
    pub fn union(hints: impl IntoIterator<Item = TypeHint>) -> TypeHint {
        let mut members: Vec<TypeHint> = Vec::new();
        for hint in hints {
            let flattened = match hint {
                TypeHint::Union(inner) => inner,
                other => vec![other],
            };
            for member in flattened {
                if member == TypeHint::Any {
                    return TypeHint::Any;
                }
                if !members.contains(&member) {
                    members.push(member);
                }
            }
        }

        match members.len() {
            0 => TypeHint::Any,
            1 => members.remove(0),
            _ => TypeHint::Union(members),
        }
    }

    /// Whether null is part of this hint
    pub fn is_nullable(&self) -> bool {
        match self {
            TypeHint::Null | TypeHint::Any => true,
            TypeHint::Union(members) => members.iter().any(TypeHint::is_nullable),
            _ => false,
        }
    }

    /// Class names referenced by this hint
    pub fn classes(&self) -> Vec<&str> {
        match self {
            TypeHint::Object(class) => vec![class.as_str()],
            TypeHint::Array(inner) => inner.classes(),
            TypeHint::Union(members) => members.iter().flat_map(TypeHint::classes).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::String => write!(f, "string"),
            TypeHint::Integer => write!(f, "int"),
            TypeHint::Number => write!(f, "float"),
            TypeHint::Boolean => write!(f, "bool"),
            TypeHint::Null => write!(f, "null"),
            TypeHint::Array(inner) => write!(f, "array<{}>", inner),
            TypeHint::Object(class) => write!(f, "{}", class),
            TypeHint::Any => write!(f, "mixed"),
            TypeHint::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
        }
    }
}
