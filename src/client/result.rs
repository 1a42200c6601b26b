//! Normalized query output

use crate::graph::{Graph, Value};
use serde::Serialize;

/// Query parameters, passed through to the backend uninterpreted
pub type Bindings = serde_json::Map<String, serde_json::Value>;

/// Result of running one query: the deduplicated graph plus one row per
/// result record, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub graph: Graph,
    pub rows: Vec<Value>,
}

impl QueryResult {
    /// Number of result rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order across map-shaped rows
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Value::Map(map) = row {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }
        columns
    }
}
