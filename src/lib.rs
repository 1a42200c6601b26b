//! Graph Studio
//!
//! Query backend for an interactive property-graph viewer. A query goes to a
//! graph database over one of two wire protocols and comes back as one
//! normalized, deduplicated graph plus a row table.
//!
//! # Architecture
//!
//! - `graph`: canonical values, nodes, edges, and the per-run accumulator
//! - `bolt`: Cypher over the Bolt protocol (PackStream encoding)
//! - `gremlin`: Gremlin traversals over WebSocket (GraphSON 3.0)
//! - `client`: the `open / run / close` facade both adapters implement
//! - `http`: the JSON API the viewer talks to
//! - `config`: YAML configuration
//!
//! ## Example Usage
//!
//! ```rust
//! use graph_studio::graph::{Edge, GraphAccumulator, Node};
//! use graph_studio::graph::property::seeded;
//!
//! let mut acc = GraphAccumulator::new();
//! acc.visit_node("1", || Node::new("1", "Person", Some(seeded("1"))));
//! acc.visit_edge("e1", || Edge::new("e1", "KNOWS", "1", "2", None).into());
//!
//! // Node "2" was only referenced by the edge and becomes a placeholder
//! let graph = acc.finish();
//! assert_eq!(graph.node_count(), 2);
//! assert!(graph.node("2").unwrap().is_placeholder());
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bolt;
pub mod client;
pub mod config;
pub mod graph;
pub mod gremlin;
pub mod http;

// Re-export main types for convenience
pub use graph::{Edge, Graph, GraphAccumulator, MultiValuePolicy, Node, PropertyMap, Value};

pub use client::{
    connect_client, Bindings, ClientResult, ConnectionInfo, Dialect, Failure, QueryClient,
    QueryError, QueryResult,
};

pub use bolt::{BoltError, CypherClient};

pub use gremlin::{GremlinClient, GremlinError};

pub use config::{ConfigError, StudioConfig};

pub use http::HttpServer;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
