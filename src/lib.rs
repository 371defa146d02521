//! Axon: a code intelligence engine for AI coding agents.
//!
//! Axon ingests a source repository, extracts its structural semantics,
//! and persists a queryable knowledge graph of symbols and relationships:
//! what calls what, what extends what, what breaks if you change X.
//!
//! # Pipeline
//!
//! The core is a linear, phase-sequential pipeline over one in-memory
//! [`KnowledgeGraph`]. Later phases depend on earlier ones, never the
//! reverse; running twice on the same commit yields the same graph.
//!
//! ```no_run
//! use axon::{run_pipeline, AnalysisConfig, CancellationToken, Collaborators};
//! use axon::storage::memory::MemoryBackend;
//!
//! let mut backend = MemoryBackend::new();
//! let result = run_pipeline(
//!     std::path::Path::new("/path/to/repo"),
//!     &mut backend,
//!     &AnalysisConfig::default(),
//!     &CancellationToken::new(),
//!     Collaborators::default(),
//! )?;
//! println!("{} symbols, {} relationships", result.symbols, result.relationships);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Position conventions
//!
//! Line numbers are 1-indexed (tree-sitter rows + 1). Paths are stored
//! repo-relative with forward slashes.
//!
//! # External collaborators
//!
//! The CLI surface, RPC server, query engine, file watcher, and embedding
//! backend live outside this crate. They interact through the
//! [`storage::StorageBackend`], [`pipeline::Encoder`], and
//! [`pipeline::VersionControl`] contracts.

pub mod cancel;
pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod storage;

pub use cancel::CancellationToken;
pub use config::AnalysisConfig;
pub use error::AxonError;
pub use graph::{
    node_id, EdgeType, GraphEdge, GraphNode, GraphStats, KnowledgeGraph, NodeKind, TypeRole,
};
pub use ingest::{detect_language, Language, ParseOutput};
pub use pipeline::{
    build_graph, run_pipeline, Collaborators, Commit, Encoder, GitLog, PipelineResult,
    VersionControl,
};
pub use storage::{MetaFile, PhaseTiming, StorageBackend, EMBEDDING_DIM, SCHEMA_VERSION};
