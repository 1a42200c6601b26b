//! Traversal result conversion into the normalized graph and rows

use super::graphson::{self, GraphSon};
use crate::client::QueryResult;
use crate::graph::property::seeded;
use crate::graph::{
    coerce_decimal, coerce_integer, Edge, EdgeDraft, GraphAccumulator, MultiValuePolicy, Node,
    Value,
};
use indexmap::IndexMap;

/// Collects the graph and rows for one traversal
#[derive(Debug, Default)]
pub struct ResultConverter {
    graph: GraphAccumulator,
    rows: Vec<Value>,
    multi_value: MultiValuePolicy,
}

impl ResultConverter {
    pub fn new(multi_value: MultiValuePolicy) -> Self {
        Self {
            multi_value,
            ..Self::default()
        }
    }

    /// Each result element becomes one row
    pub fn push(&mut self, element: GraphSon) {
        let row = self.convert(element);
        self.rows.push(row);
    }

    pub fn convert(&mut self, element: GraphSon) -> Value {
        match element {
            GraphSon::Null => Value::Null,
            GraphSon::Bool(b) => Value::Bool(b),
            GraphSon::Int(i) => coerce_integer(i as i128),
            GraphSon::BigInt(text) => coerce_decimal(&text),
            GraphSon::Double(f) => Value::Float(f),
            GraphSon::String(s) | GraphSon::Uuid(s) | GraphSon::T(s) | GraphSon::Direction(s) => {
                Value::String(s)
            }
            GraphSon::Date(ms) => Value::String(render_date(ms)),
            GraphSon::List(items) | GraphSon::Set(items) => {
                Value::List(items.into_iter().map(|item| self.convert(item)).collect())
            }
            GraphSon::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.convert(value);
                    map.insert(key.key_string(), value);
                }
                Value::Map(map)
            }
            GraphSon::Vertex(vertex) => Value::Node(self.vertex(vertex)),
            GraphSon::Edge(edge) => Value::Edge(self.edge(edge)),
            GraphSon::Path(path) => {
                let mut steps = Vec::with_capacity(path.objects.len());
                for object in path.objects {
                    match object {
                        GraphSon::Vertex(v) => steps.push(Value::Node(self.vertex(v))),
                        GraphSon::Edge(e) => steps.push(Value::Edge(self.edge(e))),
                        _ => {}
                    }
                }
                Value::Path(steps)
            }
            GraphSon::VertexProperty(p) => key_value(p.label, self.convert(*p.value)),
            GraphSon::Property(p) => key_value(p.key, self.convert(*p.value)),
            GraphSon::Raw(json) => self.convert_json(json),
        }
    }

    fn convert_json(&mut self, json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => coerce_integer(i as i128),
                None => match graphson::integer_digits(&n) {
                    Some(digits) => coerce_decimal(&digits),
                    None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(|v| self.convert_json(v)).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, self.convert_json(v)))
                    .collect(),
            ),
        }
    }

    fn vertex(&mut self, vertex: graphson::Vertex) -> Node {
        let id = vertex.id.key_string();
        let policy = self.multi_value;
        if self.graph.contains_node(&id) {
            return self.graph.visit_node(&id, || Node::new(id.clone(), "", None));
        }

        let properties = vertex.properties.map(|props| {
            let mut map = seeded(&id);
            for (key, entries) in props {
                let values = entries.into_iter().map(|p| self.convert(*p.value)).collect();
                if let Some(value) = policy.collapse(values) {
                    map.insert(key, value);
                }
            }
            map
        });
        self.graph
            .visit_node(&id, || Node::new(id.clone(), vertex.label, properties))
    }

    fn edge(&mut self, edge: graphson::Edge) -> Edge {
        let id = edge.id.key_string();
        if self.graph.contains_edge(&id) {
            return self.graph.visit_edge(&id, || {
                Edge::new(id.clone(), "", String::new(), String::new(), None).into()
            });
        }

        let properties = edge.properties.map(|props| {
            let mut map = seeded(&id);
            for (key, value) in props {
                let value = self.convert(value);
                map.insert(key, value);
            }
            map
        });
        let draft = EdgeDraft::with_endpoint_labels(
            Edge::new(
                id.clone(),
                edge.label,
                edge.out_v.key_string(),
                edge.in_v.key_string(),
                properties,
            ),
            edge.out_v_label,
            edge.in_v_label,
        );
        self.graph.visit_edge(&id, || draft)
    }

    pub fn finish(self) -> QueryResult {
        QueryResult {
            graph: self.graph.finish(),
            rows: self.rows,
        }
    }
}

fn key_value(key: String, value: Value) -> Value {
    let mut map = IndexMap::with_capacity(2);
    map.insert("key".to_string(), Value::String(key));
    map.insert("value".to_string(), value);
    Value::Map(map)
}

fn render_date(ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ID_KEY;
    use serde_json::json;

    fn decode(json: serde_json::Value) -> GraphSon {
        GraphSon::decode(json).unwrap()
    }

    fn vertex(id: i64, label: &str, name: &str) -> serde_json::Value {
        json!({
            "@type": "g:Vertex",
            "@value": {
                "id": {"@type": "g:Int64", "@value": id},
                "label": label,
                "properties": {
                    "name": [{"@type": "g:VertexProperty", "@value": {"id": {"@type": "g:Int64", "@value": id * 100}, "value": name, "label": "name"}}]
                }
            }
        })
    }

    fn edge(id: i64, out_v: i64, in_v: i64) -> serde_json::Value {
        json!({
            "@type": "g:Edge",
            "@value": {
                "id": {"@type": "g:Int64", "@value": id},
                "label": "knows",
                "inVLabel": "person",
                "outVLabel": "person",
                "inV": {"@type": "g:Int64", "@value": in_v},
                "outV": {"@type": "g:Int64", "@value": out_v},
                "properties": {
                    "weight": {"@type": "g:Property", "@value": {"key": "weight", "value": {"@type": "g:Double", "@value": 0.5}}}
                }
            }
        })
    }

    fn tagged_vertex() -> GraphSon {
        decode(json!({
            "@type": "g:Vertex",
            "@value": {
                "id": "v1",
                "label": "item",
                "properties": {
                    "tags": [
                        {"@type": "g:VertexProperty", "@value": {"id": 1, "value": "a", "label": "tags"}},
                        {"@type": "g:VertexProperty", "@value": {"id": 2, "value": "b", "label": "tags"}}
                    ]
                }
            }
        }))
    }

    #[test]
    fn test_two_vertices_and_edge() {
        let mut conv = ResultConverter::default();
        conv.push(decode(vertex(1, "person", "marko")));
        conv.push(decode(vertex(2, "person", "vadas")));
        conv.push(decode(edge(7, 1, 2)));
        let result = conv.finish();

        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.graph.node_count(), 2);
        assert_eq!(result.graph.edge_count(), 1);
        assert!(result.graph.nodes.iter().all(|n| !n.is_placeholder()));

        let marko = result.graph.node("1").unwrap();
        assert_eq!(marko.get_property(ID_KEY), Some(&Value::from("1")));
        assert_eq!(marko.get_property("name"), Some(&Value::from("marko")));

        let knows = result.graph.edge("7").unwrap();
        assert_eq!((knows.source.as_str(), knows.target.as_str()), ("1", "2"));
        assert_eq!(knows.get_property("weight"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn test_edge_endpoints_become_labelled_placeholders() {
        let mut conv = ResultConverter::default();
        conv.push(decode(edge(7, 1, 2)));
        let graph = conv.finish().graph;
        assert_eq!(graph.node_count(), 2);
        let placeholder = graph.node("2").unwrap();
        assert_eq!(placeholder.label, "person");
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn test_multi_valued_property_keeps_first() {
        let mut conv = ResultConverter::default();
        let node = conv.convert(tagged_vertex());
        assert_eq!(node.as_node().unwrap().get_property("tags"), Some(&Value::from("a")));
    }

    #[test]
    fn test_multi_valued_property_keeps_all() {
        let mut conv = ResultConverter::new(MultiValuePolicy::All);
        let node = conv.convert(tagged_vertex());
        assert_eq!(
            node.as_node().unwrap().get_property("tags"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn test_path_registers_elements_once() {
        let path = json!({
            "@type": "g:Path",
            "@value": {
                "labels": {"@type": "g:List", "@value": []},
                "objects": {"@type": "g:List", "@value": [vertex(1, "person", "marko"), edge(7, 1, 2), vertex(2, "person", "vadas"), "skipped"]}
            }
        });
        let mut conv = ResultConverter::default();
        conv.push(decode(vertex(1, "person", "marko")));
        conv.push(decode(path));
        let result = conv.finish();

        assert_eq!(result.graph.node_count(), 2);
        assert_eq!(result.graph.edge_count(), 1);
        let steps = result.rows[1].as_list().unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps[1].as_edge().is_some());
    }

    #[test]
    fn test_value_map_keys_and_big_integers() {
        let mut conv = ResultConverter::default();
        let row = conv.convert(decode(json!({
            "@type": "g:Map",
            "@value": [
                {"@type": "g:T", "@value": "id"}, {"@type": "g:Int64", "@value": 1},
                "count", {"@type": "gx:BigInteger", "@value": 99999999999999999999u128.to_string()},
                "small", {"@type": "gx:BigInteger", "@value": 42}
            ]
        })));
        let map = row.as_map().unwrap();
        assert_eq!(map["id"], Value::Integer(1));
        assert_eq!(map["count"], Value::from("99999999999999999999"));
        assert_eq!(map["small"], Value::Integer(42));
    }

    #[test]
    fn test_property_elements() {
        let mut conv = ResultConverter::default();
        let row = conv.convert(decode(json!({
            "@type": "g:VertexProperty",
            "@value": {"id": 1, "value": "marko", "label": "name"}
        })));
        let map = row.as_map().unwrap();
        assert_eq!(map["key"], Value::from("name"));
        assert_eq!(map["value"], Value::from("marko"));
    }

    #[test]
    fn test_date_renders_as_rfc3339() {
        let mut conv = ResultConverter::default();
        let value = conv.convert(GraphSon::Date(0));
        assert_eq!(value, Value::from("1970-01-01T00:00:00.000Z"));
    }
}
