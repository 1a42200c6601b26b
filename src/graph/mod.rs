//! Canonical property-graph result model
//!
//! Protocol adapters convert backend results into these types:
//! - [`Node`] / [`Edge`] identified by stringified backend ids
//! - [`Value`] for row cells, with integer coercion
//! - [`GraphAccumulator`] for per-run dedup and placeholder resolution

pub mod accumulator;
pub mod edge;
pub mod node;
pub mod property;
pub mod value;

// Re-export main types
pub use accumulator::{Graph, GraphAccumulator};
pub use edge::{Edge, EdgeDraft};
pub use node::Node;
pub use property::{MultiValuePolicy, PropertyMap, ID_KEY};
pub use value::{coerce_decimal, coerce_integer, Value, MAX_SAFE_INTEGER};
