//! Change-coupling tests against real git repositories built in temp
//! directories.

use std::fs;
use std::path::Path;
use std::process::Command;

use axon::{build_graph, AnalysisConfig, CancellationToken, EdgeType, GitLog, KnowledgeGraph};
use tempfile::TempDir;

fn run_git(workspace: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(workspace: &Path) {
    run_git(workspace, &["init", "-q"]);
    run_git(workspace, &["config", "user.email", "dev@example.com"]);
    run_git(workspace, &["config", "user.name", "dev"]);
}

fn commit_all(workspace: &Path, message: &str) {
    run_git(workspace, &["add", "."]);
    run_git(workspace, &["commit", "-q", "-m", message, "--allow-empty"]);
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn analyze(root: &Path) -> KnowledgeGraph {
    build_graph(
        root,
        &AnalysisConfig::default(),
        &CancellationToken::new(),
        &GitLog,
    )
    .unwrap()
}

fn coupled_edges(graph: &KnowledgeGraph) -> Vec<(String, String, f64, u32)> {
    graph
        .edges()
        .filter(|e| e.edge_type == EdgeType::CoupledWith)
        .map(|e| {
            (
                e.source.clone(),
                e.target.clone(),
                e.strength.unwrap(),
                e.co_changes.unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_co_changed_files_coupled() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    init_repo(root);

    // a.py and b.py change together in 3 of 10 commits each:
    // strength = 3/10 = 0.3, exactly at the threshold.
    for round in 0..3 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # v{round}\n"));
        write_file(root, "b.py", &format!("def fb():\n    pass  # v{round}\n"));
        commit_all(root, &format!("change both {round}"));
    }
    for round in 0..7 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # a{round}\n"));
        commit_all(root, &format!("change a {round}"));
    }
    for round in 0..7 {
        write_file(root, "b.py", &format!("def fb():\n    pass  # b{round}\n"));
        commit_all(root, &format!("change b {round}"));
    }

    let graph = analyze(root);
    let edges = coupled_edges(&graph);

    assert_eq!(edges.len(), 1, "one edge per unordered pair");
    let (source, target, strength, co_changes) = &edges[0];
    assert_eq!(source, "file:a.py");
    assert_eq!(target, "file:b.py");
    assert_eq!(*co_changes, 3);
    assert!((strength - 0.3).abs() < 1e-9);
}

#[test]
fn test_two_co_changes_below_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    init_repo(root);

    for round in 0..2 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # v{round}\n"));
        write_file(root, "b.py", &format!("def fb():\n    pass  # v{round}\n"));
        commit_all(root, &format!("change both {round}"));
    }

    let graph = analyze(root);
    assert!(coupled_edges(&graph).is_empty(), "2 co-changes < threshold 3");
}

#[test]
fn test_weak_coupling_filtered_by_strength() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    init_repo(root);

    // 3 co-changes, but a.py changes 15 times total: strength 0.2 < 0.3.
    for round in 0..3 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # both{round}\n"));
        write_file(root, "b.py", &format!("def fb():\n    pass  # both{round}\n"));
        commit_all(root, &format!("change both {round}"));
    }
    for round in 0..12 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # solo{round}\n"));
        commit_all(root, &format!("change a {round}"));
    }

    let graph = analyze(root);
    assert!(coupled_edges(&graph).is_empty());
}

#[test]
fn test_no_git_history_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "a.py", "def f():\n    pass\n");

    // No `git init`: the phase must be a silent no-op.
    let graph = analyze(temp_dir.path());
    assert!(coupled_edges(&graph).is_empty());
}

#[test]
fn test_coupling_ignores_files_outside_graph() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    init_repo(root);

    for round in 0..3 {
        write_file(root, "a.py", &format!("def fa():\n    pass  # v{round}\n"));
        write_file(root, "notes.txt.db", &format!("scratch {round}\n"));
        commit_all(root, &format!("change {round}"));
    }

    let graph = analyze(root);
    // The .db file is internally ignored, so no pair exists.
    assert!(coupled_edges(&graph).is_empty());
}
