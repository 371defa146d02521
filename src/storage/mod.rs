//! Storage-backend contract and end-of-run persistence.
//!
//! The pipeline builds the whole graph in memory and hands it to a backend
//! exactly once, after the final phase. A cancelled or failed run performs
//! no persistence, so a half-written database can never appear on disk.
//!
//! Backend implementations live outside this crate; an in-memory adapter
//! ships for tests (see [`memory`]).

pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AxonError;
use crate::graph::{EdgeType, KnowledgeGraph, NodeKind};

/// Current on-disk schema version, recorded in `meta.json`.
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the persistence directory under the repo root.
pub const STORE_DIR: &str = ".axon";

/// Contract between the pipeline and a storage backend.
///
/// Every call is atomic on the backend side. Upserts are idempotent: nodes
/// by `id`, edges by (source, target, type, role).
pub trait StorageBackend {
    fn upsert_nodes(&mut self, kind: NodeKind, rows: &[serde_json::Value]) -> Result<()>;

    fn upsert_edges(&mut self, edge_type: EdgeType, rows: &[serde_json::Value]) -> Result<()>;

    /// (Re-)create a full-text index over the given fields of one kind.
    fn create_fts_index(&mut self, kind: NodeKind, fields: &[&str]) -> Result<()>;

    /// (Re-)create a vector index over one field of one kind.
    fn create_vector_index(
        &mut self,
        kind: NodeKind,
        field: &str,
        dim: usize,
        metric: &str,
    ) -> Result<()>;

    /// Read-only query pass-through for consumers of the graph.
    fn query_cypher(
        &mut self,
        text: &str,
        params: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>>;
}

/// Per-phase wall-clock timing, recorded in `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseTiming {
    pub phase: String,
    pub millis: u64,
}

/// Run metadata persisted alongside the backend's files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub schema_version: u32,
    /// Commit hash the graph was built from, empty when no VCS metadata.
    pub commit: String,
    pub phase_timings: Vec<PhaseTiming>,
    pub node_counts: BTreeMap<String, usize>,
    pub edge_counts: BTreeMap<String, usize>,
}

/// Dimensionality of symbol embedding vectors.
pub const EMBEDDING_DIM: usize = 384;

/// Load the finalized graph into a backend and recreate its indexes.
///
/// # Behavior
/// 1. Upsert nodes kind by kind, rows sorted by id.
/// 2. Upsert edges type by type, rows sorted by (source, target, role).
/// 3. Recreate the FTS index over symbol names/signatures/bodies and the
///    vector index over embeddings.
///
/// Row order inside one call is deterministic so a backend diff between two
/// runs of the same commit is empty.
pub fn load_graph(graph: &KnowledgeGraph, backend: &mut dyn StorageBackend) -> Result<()> {
    for kind in NodeKind::ALL {
        let mut rows: Vec<(String, serde_json::Value)> = graph
            .nodes_by_kind(kind)
            .map(|n| Ok((n.id.clone(), serde_json::to_value(n)?)))
            .collect::<Result<_>>()?;
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let rows: Vec<serde_json::Value> = rows.into_iter().map(|(_, v)| v).collect();
        if !rows.is_empty() {
            backend
                .upsert_nodes(kind, &rows)
                .map_err(|e| AxonError::Storage(e.to_string()))?;
        }
    }

    for edge_type in EdgeType::ALL {
        let mut edges: Vec<&crate::graph::GraphEdge> = graph
            .edges()
            .filter(|e| e.edge_type == edge_type)
            .collect();
        edges.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.role.cmp(&b.role))
        });
        let rows: Vec<serde_json::Value> = edges
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;
        if !rows.is_empty() {
            backend
                .upsert_edges(edge_type, &rows)
                .map_err(|e| AxonError::Storage(e.to_string()))?;
        }
    }

    for kind in NodeKind::ALL.into_iter().filter(|k| k.is_symbol()) {
        backend
            .create_fts_index(kind, &["name", "signature", "body"])
            .map_err(|e| AxonError::Storage(e.to_string()))?;
        backend
            .create_vector_index(kind, "embedding", EMBEDDING_DIM, "cosine")
            .map_err(|e| AxonError::Storage(e.to_string()))?;
    }

    Ok(())
}

/// Write `meta.json` under `{repo_root}/.axon/`.
pub fn write_meta(repo_root: &Path, meta: &MetaFile) -> Result<()> {
    let dir = repo_root.join(STORE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating store directory {}", dir.display()))?;
    let path = dir.join("meta.json");
    let json = serde_json::to_string_pretty(meta)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Read `meta.json` back, if present.
pub fn read_meta(repo_root: &Path) -> Result<Option<MetaFile>> {
    let path = repo_root.join(STORE_DIR).join("meta.json");
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(serde_json::from_str(&json)?))
}
