//! Normalized directed edge

use super::property::PropertyMap;
use super::value::Value;
use serde::Serialize;

/// A directed edge in the normalized result graph
///
/// `source` and `target` hold node ids that may not be materialized yet
/// while results are still streaming; finalization guarantees they resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,

    /// Relationship type (e.g., "KNOWS")
    pub label: String,

    /// Source node id (edge goes FROM this node)
    pub source: String,

    /// Target node id (edge goes TO this node)
    pub target: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,
}

impl Edge {
    /// Create a new directed edge
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        properties: Option<PropertyMap>,
    ) -> Self {
        Edge {
            id: id.into(),
            label: label.into(),
            source: source.into(),
            target: target.into(),
            properties,
        }
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Check if this is a self-loop
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// An edge as built by an adapter, plus whatever the backend said about the
/// endpoint labels. The labels only matter if an endpoint ends up as a
/// placeholder.
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    pub edge: Edge,
    pub source_label: Option<String>,
    pub target_label: Option<String>,
}

impl EdgeDraft {
    pub fn with_endpoint_labels(
        edge: Edge,
        source_label: Option<String>,
        target_label: Option<String>,
    ) -> Self {
        EdgeDraft {
            edge,
            source_label,
            target_label,
        }
    }
}

impl From<Edge> for EdgeDraft {
    fn from(edge: Edge) -> Self {
        EdgeDraft {
            edge,
            source_label: None,
            target_label: None,
        }
    }
}
