//! Canonical row values and integer coercion
//!
//! Every protocol adapter converts its native result taxonomy into [`Value`].
//! Integers are coerced on the way in: anything a JSON consumer can hold
//! without precision loss stays numeric, anything larger becomes its exact
//! decimal string.

use super::edge::Edge;
use super::node::Node;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Largest integer magnitude representable exactly by an IEEE-754 double
/// (2^53 - 1), which is what the graph view ultimately parses numbers into.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// A normalized result value
///
/// Serialized untagged, so a row renders as plain JSON: nodes and edges as
/// objects, paths and lists as arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Node(Node),
    Edge(Edge),
    /// Structured path: alternating nodes and edges
    Path(Vec<Value>),
}

impl Value {
    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Value::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) | Value::Path(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Get type name as string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Node(_) => "Node",
            Value::Edge(_) => "Edge",
            Value::Path(_) => "Path",
        }
    }
}

/// Coerce a protocol integer into a row value.
///
/// Values inside `±MAX_SAFE_INTEGER` stay numeric; everything else is
/// rendered as its exact base-10 string.
pub fn coerce_integer(value: i128) -> Value {
    if value.unsigned_abs() <= MAX_SAFE_INTEGER as u128 {
        Value::Integer(value as i64)
    } else {
        Value::String(value.to_string())
    }
}

/// Coerce an arbitrary-precision integer given in decimal text.
///
/// Text that does not fit an `i128` is necessarily outside the safe range and
/// is kept verbatim (minus a leading `+`).
pub fn coerce_decimal(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed.parse::<i128>() {
        Ok(value) => coerce_integer(value),
        Err(_) => Value::String(trimmed.trim_start_matches('+').to_string()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            Value::Node(node) => write!(f, "({}:{})", node.id, node.label),
            Value::Edge(edge) => write!(f, "[{}:{}]", edge.id, edge.label),
            Value::Path(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "-")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

// Convenience conversions
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        coerce_integer(i as i128)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Edge> for Value {
    fn from(edge: Edge) -> Self {
        Value::Edge(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_integer_stays_numeric() {
        assert_eq!(coerce_integer(42), Value::Integer(42));
        assert_eq!(coerce_integer(-42), Value::Integer(-42));
        assert_eq!(
            coerce_integer(MAX_SAFE_INTEGER as i128),
            Value::Integer(MAX_SAFE_INTEGER)
        );
        assert_eq!(
            coerce_integer(-(MAX_SAFE_INTEGER as i128)),
            Value::Integer(-MAX_SAFE_INTEGER)
        );
    }

    #[test]
    fn test_oversized_integer_becomes_exact_string() {
        assert_eq!(
            coerce_integer(99_999_999_999_999_999_999),
            Value::String("99999999999999999999".to_string())
        );
        assert_eq!(
            coerce_integer(MAX_SAFE_INTEGER as i128 + 1),
            Value::String("9007199254740992".to_string())
        );
        assert_eq!(
            Value::from(i64::MIN),
            Value::String("-9223372036854775808".to_string())
        );
    }

    #[test]
    fn test_coerce_decimal_text() {
        assert_eq!(coerce_decimal("42"), Value::Integer(42));
        assert_eq!(
            coerce_decimal("99999999999999999999"),
            Value::String("99999999999999999999".to_string())
        );
        let huge = "1234567890123456789012345678901234567890123";
        assert_eq!(coerce_decimal(huge), Value::String(huge.to_string()));
    }

    #[test]
    fn test_untagged_serialization() {
        let mut map = IndexMap::new();
        map.insert("n".to_string(), Value::Integer(1));
        map.insert("big".to_string(), coerce_integer(1i128 << 60));
        let json = serde_json::to_value(Value::List(vec![Value::Null, Value::Map(map)])).unwrap();
        assert_eq!(
            json,
            serde_json::json!([null, {"n": 1, "big": "1152921504606846976"}])
        );
    }

    #[test]
    fn test_display() {
        let list = Value::List(vec![Value::Integer(1), "a".into(), Value::Bool(true)]);
        assert_eq!(list.to_string(), "[1, a, true]");
        assert_eq!(list.type_name(), "List");
    }
}
