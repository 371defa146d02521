//! In-memory knowledge graph.
//!
//! A single `KnowledgeGraph` value is owned by the pipeline driver and
//! mutated phase by phase. Nodes are created in exactly one phase and never
//! deleted; flags (`is_dead`, `is_entry_point`) may flip in later passes.
//! Edges are added throughout but never rewritten once present, with one
//! carve-out: a CALLS edge re-added for the same (caller, callee) pair keeps
//! the maximum confidence.

pub mod model;
pub mod sink;

use std::collections::{BTreeMap, HashMap};

pub use model::{node_id, synthetic_id, EdgeType, GraphEdge, GraphNode, NodeKind, TypeRole};

/// Per-kind and per-type counts for a graph.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphStats {
    pub nodes: BTreeMap<String, usize>,
    pub edges: BTreeMap<String, usize>,
}

/// The shared in-memory graph all phases read and mutate.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    /// Nodes keyed by id. BTreeMap so iteration order is deterministic.
    nodes: BTreeMap<String, GraphNode>,
    /// Edge arena; adjacency indexes point into it.
    edges: Vec<GraphEdge>,
    /// Edge identity -> arena index, for idempotent insertion.
    edge_ids: HashMap<(String, String, EdgeType, Option<TypeRole>), usize>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns false if a node with this id already existed
    /// (the existing node is kept untouched).
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Insert an edge, idempotent by (source, target, type, role).
    ///
    /// Re-inserting an existing CALLS edge keeps the maximum confidence;
    /// every other type ignores the duplicate. Returns true when the edge
    /// was new.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        let key = edge.identity();
        if let Some(&idx) = self.edge_ids.get(&key) {
            if edge.edge_type == EdgeType::Calls {
                let existing = &mut self.edges[idx];
                let old = existing.confidence.unwrap_or(0.0);
                let new = edge.confidence.unwrap_or(0.0);
                if new > old {
                    existing.confidence = Some(new);
                }
            }
            return false;
        }

        let idx = self.edges.len();
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(idx);
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push(idx);
        self.edge_ids.insert(key, idx);
        self.edges.push(edge);
        true
    }

    /// Iterate all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Iterate all nodes of one kind, in id order.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    /// Ids of all symbol nodes, in id order.
    pub fn symbol_ids(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.kind.is_symbol())
            .map(|n| n.id.clone())
            .collect()
    }

    /// Iterate all edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter()
    }

    /// Outgoing edges from a node, optionally filtered by type.
    pub fn outgoing(&self, id: &str, edge_type: Option<EdgeType>) -> Vec<&GraphEdge> {
        self.neighbor_edges(&self.outgoing, id, edge_type)
    }

    /// Incoming edges to a node, optionally filtered by type.
    pub fn incoming(&self, id: &str, edge_type: Option<EdgeType>) -> Vec<&GraphEdge> {
        self.neighbor_edges(&self.incoming, id, edge_type)
    }

    fn neighbor_edges(
        &self,
        index: &HashMap<String, Vec<usize>>,
        id: &str,
        edge_type: Option<EdgeType>,
    ) -> Vec<&GraphEdge> {
        index
            .get(id)
            .map(|indexes| {
                indexes
                    .iter()
                    .map(|&i| &self.edges[i])
                    .filter(|e| edge_type.map(|t| e.edge_type == t).unwrap_or(true))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if the node has at least one incoming edge of the given type.
    pub fn has_incoming(&self, id: &str, edge_type: EdgeType) -> bool {
        !self.incoming(id, Some(edge_type)).is_empty()
    }

    /// Impact query: every symbol that reaches `symbol_id` through CALLS
    /// edges within `depth` hops. At depth 1 this is exactly the set of
    /// direct predecessors in CALLS.
    ///
    /// # Returns
    /// Caller ids sorted lexicographically (the target itself is excluded).
    pub fn impact(&self, symbol_id: &str, depth: usize) -> Vec<String> {
        use std::collections::{HashSet, VecDeque};

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((symbol_id.to_string(), 0));
        visited.insert(symbol_id.to_string());

        let mut result = Vec::new();
        while let Some((current, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            for edge in self.incoming(&current, Some(EdgeType::Calls)) {
                if visited.insert(edge.source.clone()) {
                    result.push(edge.source.clone());
                    queue.push_back((edge.source.clone(), dist + 1));
                }
            }
        }

        result.sort();
        result
    }

    /// Per-kind node counts and per-type edge counts.
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for node in self.nodes.values() {
            *stats
                .nodes
                .entry(node.kind.table_name().to_string())
                .or_default() += 1;
        }
        for edge in &self.edges {
            *stats
                .edges
                .entry(edge.edge_type.as_str().to_string())
                .or_default() += 1;
        }
        stats
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
