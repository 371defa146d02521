//! In-memory storage adapter.
//!
//! Implements the [`StorageBackend`](super::StorageBackend) contract with
//! plain maps. Used by the test suites and as a reference for real
//! backends; `query_cypher` supports nothing and returns an error.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::graph::{EdgeType, NodeKind, TypeRole};

use super::StorageBackend;

type EdgeKey = (String, String, Option<TypeRole>);

/// Map-backed backend. Upserts follow the contract's idempotency rules.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    nodes: BTreeMap<NodeKind, BTreeMap<String, serde_json::Value>>,
    edges: BTreeMap<EdgeType, BTreeMap<EdgeKey, serde_json::Value>>,
    fts_indexes: Vec<(NodeKind, Vec<String>)>,
    vector_indexes: Vec<(NodeKind, String, usize, String)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self, kind: NodeKind) -> usize {
        self.nodes.get(&kind).map(|m| m.len()).unwrap_or(0)
    }

    pub fn edge_count(&self, edge_type: EdgeType) -> usize {
        self.edges.get(&edge_type).map(|m| m.len()).unwrap_or(0)
    }

    /// All rows of one kind, in id order.
    pub fn nodes_of(&self, kind: NodeKind) -> Vec<&serde_json::Value> {
        self.nodes
            .get(&kind)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    /// All rows of one edge type, in key order.
    pub fn edges_of(&self, edge_type: EdgeType) -> Vec<&serde_json::Value> {
        self.edges
            .get(&edge_type)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }

    pub fn fts_index_count(&self) -> usize {
        self.fts_indexes.len()
    }

    pub fn vector_index_count(&self) -> usize {
        self.vector_indexes.len()
    }
}

impl StorageBackend for MemoryBackend {
    fn upsert_nodes(&mut self, kind: NodeKind, rows: &[serde_json::Value]) -> Result<()> {
        let table = self.nodes.entry(kind).or_default();
        for row in rows {
            let Some(id) = row.get("id").and_then(|v| v.as_str()) else {
                bail!("node row without id: {row}");
            };
            table.insert(id.to_string(), row.clone());
        }
        Ok(())
    }

    fn upsert_edges(&mut self, edge_type: EdgeType, rows: &[serde_json::Value]) -> Result<()> {
        let table = self.edges.entry(edge_type).or_default();
        for row in rows {
            let source = row.get("source").and_then(|v| v.as_str());
            let target = row.get("target").and_then(|v| v.as_str());
            let (Some(source), Some(target)) = (source, target) else {
                bail!("edge row without source/target: {row}");
            };
            let role = row
                .get("role")
                .and_then(|v| serde_json::from_value::<TypeRole>(v.clone()).ok());
            table.insert(
                (source.to_string(), target.to_string(), role),
                row.clone(),
            );
        }
        Ok(())
    }

    fn create_fts_index(&mut self, kind: NodeKind, fields: &[&str]) -> Result<()> {
        // Re-creatable: drop any previous index for this kind first.
        self.fts_indexes.retain(|(k, _)| *k != kind);
        self.fts_indexes
            .push((kind, fields.iter().map(|s| s.to_string()).collect()));
        Ok(())
    }

    fn create_vector_index(
        &mut self,
        kind: NodeKind,
        field: &str,
        dim: usize,
        metric: &str,
    ) -> Result<()> {
        self.vector_indexes
            .retain(|(k, f, _, _)| !(*k == kind && f.as_str() == field));
        self.vector_indexes
            .push((kind, field.to_string(), dim, metric.to_string()));
        Ok(())
    }

    fn query_cypher(
        &mut self,
        _text: &str,
        _params: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>> {
        bail!("MemoryBackend does not implement a query engine");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_nodes_idempotent_by_id() {
        let mut backend = MemoryBackend::new();
        let row = json!({"id": "function:a.py:f", "name": "f"});
        backend
            .upsert_nodes(NodeKind::Function, &[row.clone(), row])
            .unwrap();
        assert_eq!(backend.node_count(NodeKind::Function), 1);
    }

    #[test]
    fn test_upsert_edges_role_distinguishes() {
        let mut backend = MemoryBackend::new();
        backend
            .upsert_edges(
                EdgeType::UsesType,
                &[
                    json!({"source": "a", "target": "b", "role": "param"}),
                    json!({"source": "a", "target": "b", "role": "return"}),
                    json!({"source": "a", "target": "b", "role": "param"}),
                ],
            )
            .unwrap();
        assert_eq!(backend.edge_count(EdgeType::UsesType), 2);
    }

    #[test]
    fn test_index_recreation_replaces() {
        let mut backend = MemoryBackend::new();
        backend
            .create_fts_index(NodeKind::Function, &["name"])
            .unwrap();
        backend
            .create_fts_index(NodeKind::Function, &["name", "body"])
            .unwrap();
        assert_eq!(backend.fts_index_count(), 1);
    }

    #[test]
    fn test_node_row_without_id_rejected() {
        let mut backend = MemoryBackend::new();
        let result = backend.upsert_nodes(NodeKind::Function, &[json!({"name": "f"})]);
        assert!(result.is_err());
    }
}
