//! Property containers for normalized nodes and edges
//!
//! Both adapters fold their native property bags into a [`PropertyMap`] at
//! the protocol boundary, so the accumulator never sees protocol shapes.

use super::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Synthetic property key mirroring an element's identity
pub const ID_KEY: &str = "~id";

/// Property map for normalized node and edge properties
pub type PropertyMap = IndexMap<String, Value>;

/// How a multi-valued vertex property collapses into one map entry
///
/// Gremlin vertices may carry several values under one key. `First` keeps
/// only the first value, matching what the graph view has always shown.
/// `All` keeps every value as a list (a single value stays scalar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiValuePolicy {
    #[default]
    First,
    All,
}

impl MultiValuePolicy {
    /// Collapse the values recorded under one key.
    ///
    /// Returns `None` for an empty value list so the key is skipped entirely.
    pub fn collapse(self, mut values: Vec<Value>) -> Option<Value> {
        match self {
            _ if values.is_empty() => None,
            MultiValuePolicy::First => Some(values.swap_remove(0)),
            MultiValuePolicy::All if values.len() == 1 => values.pop(),
            MultiValuePolicy::All => Some(Value::List(values)),
        }
    }
}

/// Start a property map seeded with the synthetic `~id` entry
pub fn seeded(id: &str) -> PropertyMap {
    let mut props = PropertyMap::new();
    props.insert(ID_KEY.to_string(), Value::String(id.to_string()));
    props
}
