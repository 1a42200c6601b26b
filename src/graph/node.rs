//! Normalized graph node

use super::property::PropertyMap;
use super::value::Value;
use serde::Serialize;

/// A node in the normalized result graph
///
/// `id` is the backend's element identity, stringified. `properties` is
/// `None` only when the backend element carried no property container; a
/// placeholder node has an empty map instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,

    /// Primary label, empty for placeholders and unlabeled nodes
    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,
}

impl Node {
    /// Create a node with properties
    pub fn new(id: impl Into<String>, label: impl Into<String>, properties: Option<PropertyMap>) -> Self {
        Node {
            id: id.into(),
            label: label.into(),
            properties,
        }
    }

    /// Create a placeholder for an edge endpoint that never showed up in the results
    pub fn placeholder(id: impl Into<String>, label: Option<String>) -> Self {
        Node {
            id: id.into(),
            label: label.unwrap_or_default(),
            properties: Some(PropertyMap::new()),
        }
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Placeholders carry an empty map; real nodes always have at least `~id`
    pub fn is_placeholder(&self) -> bool {
        self.properties.as_ref().is_some_and(|p| p.is_empty())
    }
}
