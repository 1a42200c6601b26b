//! Record conversion into the normalized graph and rows

use super::packstream::{BoltNode, BoltPath, BoltRelationship, PackStreamMap, PackStreamValue};
use crate::client::{Bindings, QueryResult};
use crate::graph::{coerce_integer, Edge, GraphAccumulator, Node, PropertyMap, Value, ID_KEY};
use indexmap::IndexMap;
use std::fmt::Write;

/// Collects the graph and rows for one Bolt run
#[derive(Debug, Default)]
pub struct RecordConverter {
    graph: GraphAccumulator,
    rows: Vec<Value>,
}

impl RecordConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one RECORD into a row keyed by the result fields
    pub fn on_record(&mut self, fields: &[String], values: Vec<PackStreamValue>) {
        let mut row = IndexMap::with_capacity(fields.len());
        for (key, value) in fields.iter().zip(values) {
            let converted = self.convert(value);
            row.insert(key.clone(), converted);
        }
        self.rows.push(Value::Map(row));
    }

    pub fn convert(&mut self, value: PackStreamValue) -> Value {
        match value {
            PackStreamValue::Null => Value::Null,
            PackStreamValue::Boolean(b) => Value::Bool(b),
            PackStreamValue::Integer(i) => coerce_integer(i as i128),
            PackStreamValue::Float(f) => Value::Float(f),
            PackStreamValue::String(s) => Value::String(s),
            PackStreamValue::Bytes(bytes) => {
                Value::List(bytes.into_iter().map(|b| Value::Integer(b as i64)).collect())
            }
            PackStreamValue::List(items) => {
                Value::List(items.into_iter().map(|item| self.convert(item)).collect())
            }
            PackStreamValue::Map(map) => Value::Map(
                map.into_iter()
                    .map(|(key, value)| (key, self.convert(value)))
                    .collect(),
            ),
            PackStreamValue::Node(node) => Value::Node(self.node(&node)),
            PackStreamValue::Relationship(rel) => Value::Edge(self.relationship(&rel)),
            // Only legal inside a path, render it like any other structure
            unbound @ PackStreamValue::UnboundRelationship(_) => Value::String(unbound.to_string()),
            PackStreamValue::Path(path) => Value::String(self.path(&path)),
            structure @ PackStreamValue::Structure { .. } => Value::String(structure.to_string()),
        }
    }

    fn node(&mut self, node: &BoltNode) -> Node {
        let id = node.id.to_string();
        self.graph.visit_node(&id, || {
            let label = node.labels.first().cloned().unwrap_or_default();
            Node::new(id.clone(), label, properties(&id, &node.properties))
        })
    }

    fn relationship(&mut self, rel: &BoltRelationship) -> Edge {
        let id = rel.id.to_string();
        self.graph.visit_edge(&id, || {
            Edge::new(
                id.clone(),
                rel.rel_type.clone(),
                rel.start_id.to_string(),
                rel.end_id.to_string(),
                properties(&id, &rel.properties),
            )
            .into()
        })
    }

    /// Register every element of the path and render its text form
    fn path(&mut self, path: &BoltPath) -> String {
        let mut text = match path.start() {
            Some(start) => start.to_string(),
            None => return String::new(),
        };

        // Decoding already validated the index sequence
        for segment in path.segments().unwrap_or_default() {
            self.node(&segment.start);
            self.relationship(&segment.relationship);
            self.node(&segment.end);

            let rel = &segment.relationship;
            if rel.start_id == segment.start.id {
                let _ = write!(text, "-[{}:{}]->{}", rel.id, rel.rel_type, segment.end);
            } else {
                let _ = write!(text, "<-[{}:{}]-{}", rel.id, rel.rel_type, segment.end);
            }
        }
        text
    }

    /// Finalize the graph and hand back everything collected
    pub fn finish(self) -> QueryResult {
        QueryResult {
            graph: self.graph.finish(),
            rows: self.rows,
        }
    }
}

/// Stringify every property value, led by the `~id` entry
fn properties(id: &str, raw: &Option<PackStreamMap>) -> Option<PropertyMap> {
    let raw = raw.as_ref()?;
    let mut props = PropertyMap::with_capacity(raw.len() + 1);
    props.insert(ID_KEY.to_string(), Value::String(id.to_string()));
    for (key, value) in raw {
        props.insert(key.clone(), Value::String(value.to_string()));
    }
    Some(props)
}

/// Translate JSON bindings into RUN parameters
pub fn bindings_to_parameters(bindings: &Bindings) -> PackStreamMap {
    bindings
        .iter()
        .map(|(key, value)| (key.clone(), json_to_packstream(value)))
        .collect()
}

fn json_to_packstream(value: &serde_json::Value) -> PackStreamValue {
    match value {
        serde_json::Value::Null => PackStreamValue::Null,
        serde_json::Value::Bool(b) => PackStreamValue::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => PackStreamValue::Integer(i),
            None => PackStreamValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => PackStreamValue::String(s.clone()),
        serde_json::Value::Array(items) => {
            PackStreamValue::List(items.iter().map(json_to_packstream).collect())
        }
        serde_json::Value::Object(map) => PackStreamValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_packstream(v)))
                .collect(),
        ),
    }
}
