//! Analysis configuration.
//!
//! All tunables in one place for deterministic behavior: same config + same
//! repository state always produces the same graph.

use serde::{Deserialize, Serialize};

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Include globs relative to the repo root (empty = include all).
    pub include: Vec<String>,

    /// Exclude globs relative to the repo root.
    pub exclude: Vec<String>,

    /// Roots that package-absolute import specifiers are joined against,
    /// tried in order. `""` means the repo root itself.
    pub source_roots: Vec<String>,

    /// Maximum BFS depth when tracing execution flows from an entry point.
    pub max_flow_depth: usize,

    /// Maximum callees followed per node at each flow level. Higher
    /// confidence CALLS edges are preferred when the cap bites.
    pub max_flow_branching: usize,

    /// Sliding git-history window for change coupling, in days.
    pub coupling_window_days: u64,

    /// Minimum number of shared commits before a file pair is coupled.
    pub coupling_min_co_changes: u32,

    /// Minimum coupling strength (co-changes / busier file's changes).
    pub coupling_min_strength: f64,

    /// Commits touching more than this many files are ignored by the
    /// coupling phase (merge and vendoring noise).
    pub coupling_max_commit_files: usize,

    /// Skip the embedding phase entirely.
    pub skip_embeddings: bool,

    /// Cap on the body snippet stored per symbol node, in bytes.
    pub body_snippet_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            source_roots: vec![String::new(), "src".to_string()],
            max_flow_depth: 6,
            max_flow_branching: 4,
            coupling_window_days: 180,
            coupling_min_co_changes: 3,
            coupling_min_strength: 0.3,
            coupling_max_commit_files: 100,
            skip_embeddings: false,
            body_snippet_limit: 4096,
        }
    }
}
