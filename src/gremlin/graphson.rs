//! GraphSON 3.0 typed values
//!
//! Every typed JSON value is `{"@type": "...", "@value": ...}`. Decoding turns
//! the JSON tree into [`GraphSon`], a closed set of variants the result
//! converter can match on. Types this module does not know are kept as raw
//! JSON.

use crate::client::Bindings;
use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphSonError {
    #[error("{type_name}: missing field `{field}`")]
    MissingField { type_name: String, field: &'static str },

    #[error("{type_name}: {reason}")]
    InvalidValue { type_name: String, reason: String },
}

pub type GraphSonResult<T> = Result<T, GraphSonError>;

/// Decoded GraphSON value
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSon {
    Null,
    Bool(bool),
    /// `g:Int32` / `g:Int64`
    Int(i64),
    /// `gx:BigInteger` kept as decimal text
    BigInt(String),
    /// `g:Double` / `g:Float`
    Double(f64),
    String(String),
    List(Vec<GraphSon>),
    Set(Vec<GraphSon>),
    /// `g:Map`, keys in wire order and not necessarily strings
    Map(Vec<(GraphSon, GraphSon)>),
    Uuid(String),
    /// `g:Date` / `g:Timestamp`, milliseconds since the epoch
    Date(i64),
    /// `g:T` token such as `id` or `label`
    T(String),
    /// `g:Direction` such as `OUT`
    Direction(String),
    Vertex(Vertex),
    Edge(Edge),
    Path(Path),
    VertexProperty(VertexProperty),
    Property(Property),
    /// Anything else, untouched
    Raw(Json),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: Box<GraphSon>,
    pub label: String,
    /// `None` when the vertex carried no `properties` object
    pub properties: Option<IndexMap<String, Vec<VertexProperty>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: Box<GraphSon>,
    pub label: String,
    pub out_v: Box<GraphSon>,
    pub out_v_label: Option<String>,
    pub in_v: Box<GraphSon>,
    pub in_v_label: Option<String>,
    pub properties: Option<IndexMap<String, GraphSon>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub labels: Box<GraphSon>,
    pub objects: Vec<GraphSon>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexProperty {
    pub id: Option<Box<GraphSon>>,
    pub label: String,
    pub value: Box<GraphSon>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Box<GraphSon>,
}

impl GraphSon {
    /// Decode a GraphSON 3.0 JSON tree
    pub fn decode(json: Json) -> GraphSonResult<GraphSon> {
        match json {
            Json::Null => Ok(GraphSon::Null),
            Json::Bool(b) => Ok(GraphSon::Bool(b)),
            Json::Number(n) => Ok(match n.as_i64() {
                Some(i) => GraphSon::Int(i),
                None => match integer_digits(&n) {
                    Some(digits) => GraphSon::BigInt(digits),
                    None => GraphSon::Double(n.as_f64().unwrap_or(f64::NAN)),
                },
            }),
            Json::String(s) => Ok(GraphSon::String(s)),
            Json::Array(items) => Ok(GraphSon::List(decode_all(items)?)),
            Json::Object(mut obj) => {
                let type_name = match obj.get("@type") {
                    Some(Json::String(t)) if obj.len() <= 2 => Some(t.clone()),
                    _ => None,
                };
                let Some(type_name) = type_name else {
                    // Untyped object; only legal for plain string-keyed maps
                    let entries = obj
                        .into_iter()
                        .map(|(k, v)| Ok((GraphSon::String(k), GraphSon::decode(v)?)))
                        .collect::<GraphSonResult<Vec<_>>>()?;
                    return Ok(GraphSon::Map(entries));
                };
                let value = obj.remove("@value").unwrap_or(Json::Null);
                decode_typed(&type_name, value)
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphSon::String(s) | GraphSon::Uuid(s) | GraphSon::T(s) | GraphSon::Direction(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    /// Element identity or map key as text
    pub fn key_string(&self) -> String {
        match self {
            GraphSon::String(s) | GraphSon::Uuid(s) | GraphSon::T(s) | GraphSon::Direction(s) => {
                s.clone()
            }
            GraphSon::BigInt(s) => s.clone(),
            GraphSon::Int(i) => i.to_string(),
            GraphSon::Double(f) => f.to_string(),
            GraphSon::Bool(b) => b.to_string(),
            GraphSon::Null => "null".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for GraphSon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphSon::Vertex(v) => write!(f, "v[{}]", v.id.key_string()),
            GraphSon::Edge(e) => write!(
                f,
                "e[{}][{}-{}->{}]",
                e.id.key_string(),
                e.out_v.key_string(),
                e.label,
                e.in_v.key_string()
            ),
            GraphSon::VertexProperty(p) => write!(f, "vp[{}->{}]", p.label, p.value.key_string()),
            GraphSon::Property(p) => write!(f, "p[{}->{}]", p.key, p.value.key_string()),
            GraphSon::Raw(json) => write!(f, "{}", json),
            GraphSon::List(items) | GraphSon::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.key_string())?;
                }
                write!(f, "]")
            }
            GraphSon::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k.key_string(), v.key_string())?;
                }
                write!(f, "}}")
            }
            GraphSon::Path(p) => {
                write!(f, "path[")?;
                for (i, obj) in p.objects.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", obj.key_string())?;
                }
                write!(f, "]")
            }
            GraphSon::Date(ms) => write!(f, "{}", ms),
            scalar => write!(f, "{}", scalar.key_string()),
        }
    }
}

fn decode_all(items: Vec<Json>) -> GraphSonResult<Vec<GraphSon>> {
    items.into_iter().map(GraphSon::decode).collect()
}

/// Digits of an integral number literal too wide for `i64`
pub(crate) fn integer_digits(n: &serde_json::Number) -> Option<String> {
    let text = n.to_string();
    let digits = text.strip_prefix('-').unwrap_or(&text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(text)
    } else {
        None
    }
}

fn invalid(type_name: &str, reason: impl Into<String>) -> GraphSonError {
    GraphSonError::InvalidValue {
        type_name: type_name.to_string(),
        reason: reason.into(),
    }
}

fn missing(type_name: &str, field: &'static str) -> GraphSonError {
    GraphSonError::MissingField {
        type_name: type_name.to_string(),
        field,
    }
}

fn array(type_name: &str, value: Json) -> GraphSonResult<Vec<Json>> {
    match value {
        Json::Array(items) => Ok(items),
        Json::Null => Ok(Vec::new()),
        other => Err(invalid(type_name, format!("expected array, got {}", other))),
    }
}

fn object(type_name: &str, value: Json) -> GraphSonResult<Map<String, Json>> {
    match value {
        Json::Object(obj) => Ok(obj),
        other => Err(invalid(type_name, format!("expected object, got {}", other))),
    }
}

fn label_of(type_name: &str, obj: &mut Map<String, Json>, field: &'static str) -> GraphSonResult<String> {
    match obj.remove(field) {
        Some(Json::String(s)) => Ok(s),
        Some(other) => Err(invalid(type_name, format!("`{}` must be a string, got {}", field, other))),
        None => Err(missing(type_name, field)),
    }
}

fn integer(type_name: &str, value: &Json) -> GraphSonResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| invalid(type_name, format!("expected integer, got {}", value)))
}

fn float(type_name: &str, value: &Json) -> GraphSonResult<f64> {
    match value {
        Json::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(type_name, format!("unrepresentable number {}", n))),
        Json::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => Err(invalid(type_name, format!("expected number, got {:?}", s))),
        },
        other => Err(invalid(type_name, format!("expected number, got {}", other))),
    }
}

fn decode_typed(type_name: &str, value: Json) -> GraphSonResult<GraphSon> {
    match type_name {
        "g:List" => Ok(GraphSon::List(decode_all(array(type_name, value)?)?)),
        "g:Set" => Ok(GraphSon::Set(decode_all(array(type_name, value)?)?)),
        "g:Map" => {
            let items = array(type_name, value)?;
            if items.len() % 2 != 0 {
                return Err(invalid(type_name, "odd number of key/value entries"));
            }
            let mut entries = Vec::with_capacity(items.len() / 2);
            let mut it = items.into_iter();
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                entries.push((GraphSon::decode(k)?, GraphSon::decode(v)?));
            }
            Ok(GraphSon::Map(entries))
        }
        "g:Int32" | "g:Int64" | "gx:Int16" | "gx:Byte" => Ok(GraphSon::Int(integer(type_name, &value)?)),
        "gx:BigInteger" => match value {
            Json::Number(n) => Ok(GraphSon::BigInt(n.to_string())),
            Json::String(s) => Ok(GraphSon::BigInt(s)),
            other => Err(invalid(type_name, format!("expected integer, got {}", other))),
        },
        "g:Double" | "g:Float" | "gx:BigDecimal" => Ok(GraphSon::Double(float(type_name, &value)?)),
        "g:UUID" => match value {
            Json::String(s) => Ok(GraphSon::Uuid(s)),
            other => Err(invalid(type_name, format!("expected string, got {}", other))),
        },
        "g:Date" | "g:Timestamp" => Ok(GraphSon::Date(integer(type_name, &value)?)),
        "g:T" => match value {
            Json::String(s) => Ok(GraphSon::T(s)),
            other => Err(invalid(type_name, format!("expected string, got {}", other))),
        },
        "g:Direction" => match value {
            Json::String(s) => Ok(GraphSon::Direction(s)),
            other => Err(invalid(type_name, format!("expected string, got {}", other))),
        },
        "g:Vertex" => decode_vertex(value).map(GraphSon::Vertex),
        "g:Edge" => decode_edge(value).map(GraphSon::Edge),
        "g:Path" => {
            let mut obj = object(type_name, value)?;
            let labels = GraphSon::decode(obj.remove("labels").unwrap_or(Json::Null))?;
            let objects = match GraphSon::decode(obj.remove("objects").ok_or_else(|| missing(type_name, "objects"))?)? {
                GraphSon::List(items) | GraphSon::Set(items) => items,
                other => return Err(invalid(type_name, format!("objects must be a list, got {}", other))),
            };
            Ok(GraphSon::Path(Path {
                labels: Box::new(labels),
                objects,
            }))
        }
        "g:VertexProperty" => decode_vertex_property(value).map(GraphSon::VertexProperty),
        "g:Property" => {
            let mut obj = object(type_name, value)?;
            let key = label_of(type_name, &mut obj, "key")?;
            let value = GraphSon::decode(obj.remove("value").unwrap_or(Json::Null))?;
            Ok(GraphSon::Property(Property {
                key,
                value: Box::new(value),
            }))
        }
        "g:BulkSet" => {
            // Alternating value, bulk pairs; expand each value `bulk` times
            let items = array(type_name, value)?;
            let mut expanded = Vec::new();
            let mut it = items.into_iter();
            while let (Some(v), Some(bulk)) = (it.next(), it.next()) {
                let value = GraphSon::decode(v)?;
                let count = match GraphSon::decode(bulk)? {
                    GraphSon::Int(n) if n >= 0 => n as usize,
                    other => return Err(invalid(type_name, format!("bad bulk {}", other))),
                };
                expanded.extend(std::iter::repeat(value).take(count));
            }
            Ok(GraphSon::List(expanded))
        }
        "g:Traverser" => {
            let mut obj = object(type_name, value)?;
            GraphSon::decode(obj.remove("value").ok_or_else(|| missing(type_name, "value"))?)
        }
        _ => Ok(GraphSon::Raw(json!({ "@type": type_name, "@value": value }))),
    }
}

fn decode_vertex(value: Json) -> GraphSonResult<Vertex> {
    let type_name = "g:Vertex";
    let mut obj = object(type_name, value)?;
    let id = GraphSon::decode(obj.remove("id").ok_or_else(|| missing(type_name, "id"))?)?;
    let label = label_of(type_name, &mut obj, "label").unwrap_or_default();

    let properties = match obj.remove("properties") {
        None | Some(Json::Null) => None,
        Some(props) => {
            let mut out = IndexMap::new();
            for (key, entries) in object(type_name, props)? {
                let entries = match entries {
                    Json::Array(items) => items,
                    single => vec![single],
                };
                let mut values = Vec::with_capacity(entries.len());
                for entry in entries {
                    match GraphSon::decode(entry)? {
                        GraphSon::VertexProperty(vp) => values.push(vp),
                        other => values.push(VertexProperty {
                            id: None,
                            label: key.clone(),
                            value: Box::new(other),
                        }),
                    }
                }
                out.insert(key, values);
            }
            Some(out)
        }
    };

    Ok(Vertex {
        id: Box::new(id),
        label,
        properties,
    })
}

fn decode_edge(value: Json) -> GraphSonResult<Edge> {
    let type_name = "g:Edge";
    let mut obj = object(type_name, value)?;
    let id = GraphSon::decode(obj.remove("id").ok_or_else(|| missing(type_name, "id"))?)?;
    let label = label_of(type_name, &mut obj, "label").unwrap_or_default();
    let out_v = GraphSon::decode(obj.remove("outV").ok_or_else(|| missing(type_name, "outV"))?)?;
    let in_v = GraphSon::decode(obj.remove("inV").ok_or_else(|| missing(type_name, "inV"))?)?;
    let out_v_label = label_of(type_name, &mut obj, "outVLabel").ok();
    let in_v_label = label_of(type_name, &mut obj, "inVLabel").ok();

    let properties = match obj.remove("properties") {
        None | Some(Json::Null) => None,
        Some(props) => {
            let mut out = IndexMap::new();
            for (key, raw) in object(type_name, props)? {
                let value = match GraphSon::decode(raw)? {
                    GraphSon::Property(p) => *p.value,
                    other => other,
                };
                out.insert(key, value);
            }
            Some(out)
        }
    };

    Ok(Edge {
        id: Box::new(id),
        label,
        out_v: Box::new(out_v),
        out_v_label,
        in_v: Box::new(in_v),
        in_v_label,
        properties,
    })
}

fn decode_vertex_property(value: Json) -> GraphSonResult<VertexProperty> {
    let type_name = "g:VertexProperty";
    let mut obj = object(type_name, value)?;
    let id = match obj.remove("id") {
        Some(raw) => Some(Box::new(GraphSon::decode(raw)?)),
        None => None,
    };
    let label = label_of(type_name, &mut obj, "label")?;
    let value = GraphSon::decode(obj.remove("value").unwrap_or(Json::Null))?;
    Ok(VertexProperty {
        id,
        label,
        value: Box::new(value),
    })
}

/// Encode request bindings with GraphSON type tags
pub fn encode_bindings(bindings: &Bindings) -> Json {
    Json::Object(
        bindings
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

fn encode_value(value: &Json) -> Json {
    match value {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    json!({"@type": "g:Int32", "@value": i})
                } else {
                    json!({"@type": "g:Int64", "@value": i})
                }
            } else {
                json!({"@type": "g:Double", "@value": n})
            }
        }
        Json::Array(items) => {
            json!({"@type": "g:List", "@value": items.iter().map(encode_value).collect::<Vec<_>>()})
        }
        Json::Object(map) => {
            let flat: Vec<Json> = map
                .iter()
                .flat_map(|(k, v)| [Json::String(k.clone()), encode_value(v)])
                .collect();
            json!({"@type": "g:Map", "@value": flat})
        }
        scalar => scalar.clone(),
    }
}
