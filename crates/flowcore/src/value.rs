use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of variable types understood by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Map,
    DateTime,
    Null,
}

impl VariableType {
    /// Infer the type of a plain JSON value.
    ///
    /// `Map` and `DateTime` are never inferred; they only come from a
    /// declaring schema.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => VariableType::Null,
            Value::Bool(_) => VariableType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => VariableType::Integer,
            Value::Number(_) => VariableType::Number,
            Value::String(_) => VariableType::String,
            Value::Array(_) => VariableType::Array,
            Value::Object(_) => VariableType::Object,
        }
    }

    /// Map a JSON-schema `type` (plus optional `format`) to a variable type.
    pub fn from_schema(ty: &str, format: Option<&str>) -> Option<Self> {
        let parsed = match ty {
            "string" if format == Some("date-time") => VariableType::DateTime,
            "string" => VariableType::String,
            "integer" => VariableType::Integer,
            "number" => VariableType::Number,
            "boolean" => VariableType::Boolean,
            "object" => VariableType::Object,
            "array" => VariableType::Array,
            "map" => VariableType::Map,
            "date-time" => VariableType::DateTime,
            "null" => VariableType::Null,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, VariableType::Integer | VariableType::Number)
    }

    /// Whether a value of type `other` satisfies an expectation of `self`.
    /// Integer and Number are interchangeable.
    pub fn accepts(self, other: VariableType) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Integer => "integer",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
            VariableType::Object => "object",
            VariableType::Array => "array",
            VariableType::Map => "map",
            VariableType::DateTime => "date-time",
            VariableType::Null => "null",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON value together with its declared (or inferred) type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub ty: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_type: Option<VariableType>,
}

impl TypedValue {
    pub fn new(value: Value, ty: VariableType) -> Self {
        Self {
            value,
            ty,
            items_type: None,
        }
    }

    pub fn with_items_type(mut self, items_type: Option<VariableType>) -> Self {
        self.items_type = items_type;
        self
    }

    /// Build a typed value from plain JSON, inferring the type.
    /// Arrays take their item type from the first non-null element; an
    /// array holding only nulls has none.
    pub fn infer(value: Value) -> Self {
        let ty = VariableType::infer(&value);
        let items_type = match &value {
            Value::Array(items) => items.iter().find(|v| !v.is_null()).map(VariableType::infer),
            _ => None,
        };
        Self {
            value,
            ty,
            items_type,
        }
    }

    pub fn null() -> Self {
        Self::new(Value::Null, VariableType::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_bool()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        TypedValue::new(Value::String(s), VariableType::String)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        TypedValue::from(s.to_string())
    }
}

impl From<f64> for TypedValue {
    fn from(n: f64) -> Self {
        TypedValue::new(Value::from(n), VariableType::Number)
    }
}

impl From<i64> for TypedValue {
    fn from(n: i64) -> Self {
        TypedValue::new(Value::from(n), VariableType::Integer)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        TypedValue::new(Value::Bool(b), VariableType::Boolean)
    }
}

impl From<Value> for TypedValue {
    fn from(j: Value) -> Self {
        TypedValue::infer(j)
    }
}
