//! Per-run graph accumulation
//!
//! Nodes and edges are collected by id while a result streams in. Edge
//! endpoints that have not been seen as nodes yet go into a pending set,
//! which a single finalization pass turns into placeholder nodes. One
//! accumulator lives exactly as long as one query run.

use super::edge::{Edge, EdgeDraft};
use super::node::Node;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

/// Final deduplicated graph
///
/// Order is first-seen order; consumers index by id, but tests rely on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up an edge by id
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }
}

/// Mutable per-run node/edge store with pending endpoint tracking
#[derive(Debug, Default)]
pub struct GraphAccumulator {
    nodes: IndexMap<String, Node>,
    edges: IndexMap<String, Edge>,
    /// Endpoint id -> label reported alongside the edge, if any
    pending: IndexMap<String, Option<String>>,
}

impl GraphAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical node for `id`, building it on first sight.
    pub fn visit_node<F>(&mut self, id: &str, build: F) -> Node
    where
        F: FnOnce() -> Node,
    {
        if let Some(node) = self.nodes.get(id) {
            return node.clone();
        }
        let node = build();
        debug_assert_eq!(node.id, id);
        self.nodes.insert(id.to_string(), node.clone());
        node
    }

    /// Return the canonical edge for `id`, building it on first sight.
    ///
    /// Endpoints not yet present as nodes are recorded as pending, keeping
    /// the first label any edge reported for them.
    pub fn visit_edge<F>(&mut self, id: &str, build: F) -> Edge
    where
        F: FnOnce() -> EdgeDraft,
    {
        if let Some(edge) = self.edges.get(id) {
            return edge.clone();
        }
        let EdgeDraft {
            edge,
            source_label,
            target_label,
        } = build();
        self.mark_pending(&edge.source, source_label);
        self.mark_pending(&edge.target, target_label);
        self.edges.insert(id.to_string(), edge.clone());
        edge
    }

    fn mark_pending(&mut self, id: &str, label: Option<String>) {
        if self.nodes.contains_key(id) {
            return;
        }
        let slot = self.pending.entry(id.to_string()).or_insert(None);
        if slot.is_none() {
            *slot = label;
        }
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// Ids referenced by edges that are still not materialized as nodes
    pub fn pending_ids(&self) -> Vec<&str> {
        self.pending
            .keys()
            .filter(|id| !self.nodes.contains_key(id.as_str()))
            .map(|id| id.as_str())
            .collect()
    }

    /// Resolve pending endpoints into placeholders and emit the graph.
    pub fn finish(mut self) -> Graph {
        let pending = std::mem::take(&mut self.pending);
        let mut placeholders = 0usize;
        for (id, label) in pending {
            if !self.nodes.contains_key(&id) {
                let node = Node::placeholder(id.clone(), label);
                self.nodes.insert(id, node);
                placeholders += 1;
            }
        }

        debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            placeholders,
            "graph finalized"
        );

        Graph {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges.into_values().collect(),
        }
    }
}
