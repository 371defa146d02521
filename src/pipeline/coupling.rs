//! Phase 11: change coupling from version-control history.
//!
//! Reads the repository's git log over a sliding window, builds a
//! co-change matrix over unordered file pairs, and emits one COUPLED_WITH
//! edge per pair whose shared-commit count and coupling strength clear
//! the configured thresholds:
//!
//! ```text
//! strength(A, B) = co_changes(A, B) / max(changes(A), changes(B))
//! ```
//!
//! The edge is written once per unordered pair (lexicographically smaller
//! path as source) and treated as undirected. Without VCS metadata the
//! phase is a no-op.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::graph::{node_id, EdgeType, GraphEdge, KnowledgeGraph, NodeKind};

/// One commit in the analysis window.
#[derive(Debug, Clone)]
pub struct Commit {
    pub sha: String,
    pub timestamp: i64,
    pub changed_paths: Vec<String>,
}

/// Version-control contract: the coupling phase only needs the log.
pub trait VersionControl {
    /// Commits under `path` newer than `since_days` days, with their
    /// changed file paths (repo-relative).
    fn log(&self, path: &Path, since_days: u64) -> Result<Vec<Commit>>;

    /// Current HEAD commit hash, empty when unavailable.
    fn head(&self, path: &Path) -> String {
        let _ = path;
        String::new()
    }
}

/// `git` subprocess implementation of [`VersionControl`].
pub struct GitLog;

impl VersionControl for GitLog {
    fn log(&self, path: &Path, since_days: u64) -> Result<Vec<Commit>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args([
                "log",
                &format!("--since={since_days} days ago"),
                "--name-only",
                "--no-renames",
                "--pretty=format:%H|%ct",
            ])
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!("git unavailable: {e}");
                return Ok(Vec::new());
            }
        };
        if !output.status.success() {
            // Not a repository, or no commits: coupling is a no-op.
            debug!("git log failed with status {}", output.status);
            return Ok(Vec::new());
        }

        Ok(parse_log(&String::from_utf8_lossy(&output.stdout)))
    }

    fn head(&self, path: &Path) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "HEAD"])
            .output();
        match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            }
            _ => String::new(),
        }
    }
}

/// Parse `git log --name-only --pretty=format:%H|%ct` output.
fn parse_log(stdout: &str) -> Vec<Commit> {
    let mut commits = Vec::new();
    let mut current: Option<Commit> = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((sha, timestamp)) = split_header(line) {
            if let Some(done) = current.take() {
                commits.push(done);
            }
            current = Some(Commit {
                sha: sha.to_string(),
                timestamp,
                changed_paths: Vec::new(),
            });
        } else if let Some(commit) = current.as_mut() {
            commit.changed_paths.push(line.to_string());
        }
    }
    if let Some(done) = current.take() {
        commits.push(done);
    }
    commits
}

fn split_header(line: &str) -> Option<(&str, i64)> {
    let (sha, timestamp) = line.split_once('|')?;
    if sha.len() != 40 || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some((sha, timestamp.parse().ok()?))
}

/// Analyze co-changes and write COUPLED_WITH edges.
///
/// # Returns
/// The number of coupled pairs written.
pub fn process_coupling(
    graph: &mut KnowledgeGraph,
    repo_path: &Path,
    config: &AnalysisConfig,
    vcs: &dyn VersionControl,
) -> usize {
    let commits = match vcs.log(repo_path, config.coupling_window_days) {
        Ok(commits) => commits,
        Err(e) => {
            warn!("version-control log failed: {e}");
            return 0;
        }
    };
    if commits.is_empty() {
        return 0;
    }

    // Only files present in the graph participate.
    let known_files: BTreeSet<String> = graph
        .nodes_by_kind(NodeKind::File)
        .map(|n| n.file_path.clone())
        .collect();

    let mut changes: HashMap<String, u32> = HashMap::new();
    let mut co_changes: BTreeMap<(String, String), u32> = BTreeMap::new();

    for commit in &commits {
        let mut files: Vec<&String> = commit
            .changed_paths
            .iter()
            .filter(|p| known_files.contains(*p))
            .collect();
        files.sort();
        files.dedup();

        // Bulk commits (merges, vendoring, formatting sweeps) couple
        // everything with everything and drown the signal.
        if files.len() > config.coupling_max_commit_files {
            continue;
        }

        for file in &files {
            *changes.entry((*file).clone()).or_default() += 1;
        }
        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let key = (files[i].clone(), files[j].clone());
                *co_changes.entry(key).or_default() += 1;
            }
        }
    }

    let mut coupled = 0;
    for ((a, b), count) in co_changes {
        if count < config.coupling_min_co_changes {
            continue;
        }
        let changes_a = changes.get(&a).copied().unwrap_or(1);
        let changes_b = changes.get(&b).copied().unwrap_or(1);
        let strength = f64::from(count) / f64::from(changes_a.max(changes_b));
        if strength < config.coupling_min_strength {
            continue;
        }

        let mut edge = GraphEdge::new(
            EdgeType::CoupledWith,
            node_id(NodeKind::File, &a, ""),
            node_id(NodeKind::File, &b, ""),
        );
        edge.strength = Some(strength);
        edge.co_changes = Some(count);
        if graph.add_edge(edge) {
            coupled += 1;
        }
    }

    debug!("coupling: {coupled} pairs over {} commits", commits.len());
    coupled
}
