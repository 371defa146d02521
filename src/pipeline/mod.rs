//! Pipeline orchestrator.
//!
//! Runs all twelve phases in sequence over a shared in-memory
//! [`KnowledgeGraph`], bulk-loads the finalized graph into a storage
//! backend, writes `meta.json`, and returns a summary.
//!
//! Phases:
//! 1.  File walking
//! 2.  Structure (Folder/File nodes + CONTAINS)
//! 3.  Code parsing (symbol nodes + DEFINES/EXPORTS)
//! 4.  Import resolution (IMPORTS)
//! 5.  Call tracing (CALLS)
//! 6.  Heritage (EXTENDS / IMPLEMENTS)
//! 7.  Type analysis (USES_TYPE)
//! 8.  Community detection (Community + MEMBER_OF)
//! 9.  Process detection (Process + STEP_IN_PROCESS)
//! 10. Dead-code detection (`is_dead` flags)
//! 11. Change coupling (COUPLED_WITH)
//! 12. Embeddings (vectors on symbol nodes)
//!
//! The run is idempotent per (repo, commit): the same input produces the
//! same graph. Persistence happens exactly once, after the final phase; a
//! cancelled or failed run leaves no partial database behind.

pub mod calls;
pub mod community;
pub mod coupling;
pub mod dead_code;
pub mod embeddings;
pub mod filter;
pub mod flows;
pub mod heritage;
pub mod imports;
pub mod parse;
pub mod structure;
pub mod types;
pub mod walker;

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cancel::CancellationToken;
use crate::config::AnalysisConfig;
use crate::graph::{GraphStats, KnowledgeGraph};
use crate::storage::{self, MetaFile, PhaseTiming, StorageBackend};

pub use coupling::{Commit, GitLog, VersionControl};
pub use embeddings::Encoder;
pub use walker::FileEntry;

/// Progress callback: `(phase name, fraction in [0, 1])`.
pub type Progress<'a> = dyn Fn(&str, f64) + 'a;

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    pub files: usize,
    pub symbols: usize,
    pub relationships: usize,
    pub clusters: usize,
    pub processes: usize,
    pub dead_code: usize,
    pub coupled_pairs: usize,
    pub embedded: usize,
    pub duration_millis: u64,
    pub phase_timings: Vec<PhaseTiming>,
}

/// External collaborators for a run. `Default` wires the git subprocess
/// and no encoder.
pub struct Collaborators<'a> {
    pub vcs: &'a dyn VersionControl,
    pub encoder: Option<&'a dyn Encoder>,
    pub progress: Option<&'a Progress<'a>>,
}

impl Default for Collaborators<'_> {
    fn default() -> Self {
        Self {
            vcs: &GitLog,
            encoder: None,
            progress: None,
        }
    }
}

/// Run phases 1-12 and load the result into `storage`.
///
/// # Behavior
/// - Phase-sequential; the cancellation token is checked between phases
///   (and inside parallel phases, between work items).
/// - Persistence happens once at the end: backend load, index creation,
///   then `meta.json` under `{repo_path}/.axon/`.
/// - A cancelled run returns `AxonError::Cancelled` and persists nothing.
///
/// # Errors
/// Fatal: unreadable repo root, cancellation, storage failure. Per-file
/// problems never abort the run.
pub fn run_pipeline(
    repo_path: &Path,
    storage: &mut dyn StorageBackend,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
    collaborators: Collaborators<'_>,
) -> Result<PipelineResult> {
    let start = Instant::now();
    let mut result = PipelineResult::default();
    let mut timings: Vec<PhaseTiming> = Vec::new();
    let report = |phase: &str, pct: f64| {
        if let Some(progress) = collaborators.progress {
            progress(phase, pct);
        }
    };

    let mut graph = KnowledgeGraph::new();

    // Phase 1: walk.
    report("Walking files", 0.0);
    let phase_start = Instant::now();
    let entries = walker::walk_repo(repo_path, config, cancel)?;
    result.files = entries.len();
    timings.push(timing("walk", phase_start));
    report("Walking files", 1.0);
    cancel.check()?;

    // Phase 2: structure.
    report("Processing structure", 0.0);
    let phase_start = Instant::now();
    structure::process_structure(&entries, &mut graph);
    timings.push(timing("structure", phase_start));
    report("Processing structure", 1.0);
    cancel.check()?;

    // Phase 3: parsing.
    report("Parsing code", 0.0);
    let phase_start = Instant::now();
    let parse_data = parse::process_parsing(entries, &mut graph, config, cancel)?;
    timings.push(timing("parse", phase_start));
    report("Parsing code", 1.0);
    cancel.check()?;

    // Phase 4: imports.
    report("Resolving imports", 0.0);
    let phase_start = Instant::now();
    imports::process_imports(&parse_data, &mut graph, config);
    timings.push(timing("imports", phase_start));
    report("Resolving imports", 1.0);
    cancel.check()?;

    // Phase 5: calls.
    report("Tracing calls", 0.0);
    let phase_start = Instant::now();
    calls::process_calls(&parse_data, &mut graph);
    timings.push(timing("calls", phase_start));
    report("Tracing calls", 1.0);
    cancel.check()?;

    // Phase 6: heritage.
    report("Extracting heritage", 0.0);
    let phase_start = Instant::now();
    heritage::process_heritage(&parse_data, &mut graph);
    timings.push(timing("heritage", phase_start));
    report("Extracting heritage", 1.0);
    cancel.check()?;

    // Phase 7: types.
    report("Analyzing types", 0.0);
    let phase_start = Instant::now();
    types::process_types(&parse_data, &mut graph);
    timings.push(timing("types", phase_start));
    report("Analyzing types", 1.0);
    cancel.check()?;

    // Phase 8: communities.
    report("Detecting communities", 0.0);
    let phase_start = Instant::now();
    result.clusters = community::process_communities(&mut graph);
    timings.push(timing("communities", phase_start));
    report("Detecting communities", 1.0);
    cancel.check()?;

    // Phase 9: flows.
    report("Detecting execution flows", 0.0);
    let phase_start = Instant::now();
    result.processes = flows::process_flows(&mut graph, config);
    timings.push(timing("flows", phase_start));
    report("Detecting execution flows", 1.0);
    cancel.check()?;

    // Phase 10: dead code.
    report("Finding dead code", 0.0);
    let phase_start = Instant::now();
    result.dead_code = dead_code::process_dead_code(&mut graph);
    timings.push(timing("dead_code", phase_start));
    report("Finding dead code", 1.0);
    cancel.check()?;

    // Phase 11: coupling.
    report("Analyzing git history", 0.0);
    let phase_start = Instant::now();
    result.coupled_pairs =
        coupling::process_coupling(&mut graph, repo_path, config, collaborators.vcs);
    timings.push(timing("coupling", phase_start));
    report("Analyzing git history", 1.0);
    cancel.check()?;

    // Phase 12: embeddings.
    report("Generating embeddings", 0.0);
    let phase_start = Instant::now();
    if let Some(encoder) = collaborators.encoder {
        result.embedded = embeddings::process_embeddings(&mut graph, config, encoder);
    }
    timings.push(timing("embeddings", phase_start));
    report("Generating embeddings", 1.0);
    cancel.check()?;

    // Persist once, at the end.
    report("Loading to storage", 0.0);
    let phase_start = Instant::now();
    storage::load_graph(&graph, storage)?;
    timings.push(timing("storage", phase_start));

    let stats = graph.stats();
    let meta = MetaFile {
        schema_version: storage::SCHEMA_VERSION,
        commit: collaborators.vcs.head(repo_path),
        phase_timings: timings.clone(),
        node_counts: stats.nodes.clone(),
        edge_counts: stats.edges.clone(),
    };
    storage::write_meta(repo_path, &meta)?;
    report("Loading to storage", 1.0);

    result.symbols = count_symbols(&stats);
    result.relationships = graph.edge_count();
    result.phase_timings = timings;
    result.duration_millis = start.elapsed().as_millis() as u64;

    info!(
        "pipeline done: {} files, {} symbols, {} relationships in {}ms",
        result.files, result.symbols, result.relationships, result.duration_millis
    );
    Ok(result)
}

/// Run phases 1-11 and return the in-memory graph without touching any
/// storage backend. Used by snapshot comparison and the test suites.
pub fn build_graph(
    repo_path: &Path,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
    vcs: &dyn VersionControl,
) -> Result<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::new();

    let entries = walker::walk_repo(repo_path, config, cancel)?;
    structure::process_structure(&entries, &mut graph);
    let parse_data = parse::process_parsing(entries, &mut graph, config, cancel)?;
    imports::process_imports(&parse_data, &mut graph, config);
    calls::process_calls(&parse_data, &mut graph);
    heritage::process_heritage(&parse_data, &mut graph);
    types::process_types(&parse_data, &mut graph);
    community::process_communities(&mut graph);
    flows::process_flows(&mut graph, config);
    dead_code::process_dead_code(&mut graph);
    coupling::process_coupling(&mut graph, repo_path, config, vcs);
    cancel.check()?;

    Ok(graph)
}

fn timing(phase: &str, started: Instant) -> PhaseTiming {
    PhaseTiming {
        phase: phase.to_string(),
        millis: started.elapsed().as_millis() as u64,
    }
}

fn count_symbols(stats: &GraphStats) -> usize {
    const SYMBOL_TABLES: [&str; 6] = [
        "Function",
        "Class",
        "Method",
        "Interface",
        "TypeAlias",
        "Enum",
    ];
    SYMBOL_TABLES
        .iter()
        .map(|table| stats.nodes.get(*table).copied().unwrap_or(0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_repo_empty_graph() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = MemoryBackend::new();

        let result = run_pipeline(
            temp_dir.path(),
            &mut backend,
            &AnalysisConfig::default(),
            &CancellationToken::new(),
            Collaborators::default(),
        )
        .unwrap();

        assert_eq!(result.files, 0);
        assert_eq!(result.symbols, 0);
    }

    #[test]
    fn test_cancelled_run_persists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let mut backend = MemoryBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_pipeline(
            temp_dir.path(),
            &mut backend,
            &AnalysisConfig::default(),
            &cancel,
            Collaborators::default(),
        );

        assert!(result.is_err());
        assert_eq!(backend.node_count(crate::graph::NodeKind::File), 0);
        assert!(!temp_dir.path().join(".axon/meta.json").exists());
    }

    #[test]
    fn test_progress_reports_all_phases() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let mut backend = MemoryBackend::new();

        let phases = std::sync::Mutex::new(Vec::new());
        let progress = |phase: &str, pct: f64| {
            if pct == 0.0 {
                phases.lock().unwrap().push(phase.to_string());
            }
        };

        run_pipeline(
            temp_dir.path(),
            &mut backend,
            &AnalysisConfig::default(),
            &CancellationToken::new(),
            Collaborators {
                progress: Some(&progress),
                ..Collaborators::default()
            },
        )
        .unwrap();

        let seen = phases.lock().unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("Walking files"));
        assert_eq!(seen.last().map(String::as_str), Some("Loading to storage"));
        assert_eq!(seen.len(), 13);
    }
}
