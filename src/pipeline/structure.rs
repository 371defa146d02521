//! Phase 2: structure processing.
//!
//! Builds the Folder/File tree rooted at the repo path and emits CONTAINS
//! edges. This is the only phase allowed to introduce Folder nodes.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::graph::{node_id, EdgeType, GraphEdge, GraphNode, KnowledgeGraph, NodeKind};

use super::walker::FileEntry;

/// Build File/Folder nodes and CONTAINS relationships.
///
/// # Behavior
/// - One File node per entry (path, language, byte size, SHA-256 hash).
/// - One Folder node per unique ancestor directory.
/// - CONTAINS: Folder → Folder (immediate parent) and Folder → File.
///   Root-level entries have no containing folder.
pub fn process_structure(entries: &[FileEntry], graph: &mut KnowledgeGraph) {
    // Every ancestor directory across all files, deduplicated and sorted.
    let mut folder_paths: BTreeSet<String> = BTreeSet::new();
    for entry in entries {
        for ancestor in ancestors(&entry.path) {
            folder_paths.insert(ancestor);
        }
    }

    for dir_path in &folder_paths {
        let id = node_id(NodeKind::Folder, dir_path, "");
        let mut node = GraphNode::new(NodeKind::Folder, id, base_name(dir_path));
        node.file_path = dir_path.clone();
        graph.add_node(node);
    }

    for entry in entries {
        let id = node_id(NodeKind::File, &entry.path, "");
        let mut node = GraphNode::new(NodeKind::File, id, base_name(&entry.path));
        node.file_path = entry.path.clone();
        node.language = entry.language_name().to_string();
        node.byte_size = entry.source.len() as u64;
        node.hash = content_hash(&entry.source);
        graph.add_node(node);
    }

    // Folder -> Folder.
    for dir_path in &folder_paths {
        if let Some(parent) = parent_of(dir_path) {
            graph.add_edge(GraphEdge::new(
                EdgeType::Contains,
                node_id(NodeKind::Folder, &parent, ""),
                node_id(NodeKind::Folder, dir_path, ""),
            ));
        }
    }

    // Folder -> File.
    for entry in entries {
        if let Some(parent) = parent_of(&entry.path) {
            graph.add_edge(GraphEdge::new(
                EdgeType::Contains,
                node_id(NodeKind::Folder, &parent, ""),
                node_id(NodeKind::File, &entry.path, ""),
            ));
        }
    }
}

/// SHA-256 hex digest of the file contents.
fn content_hash(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    format!("{:x}", hasher.finalize())
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn parent_of(path: &str) -> Option<String> {
    path.rsplit_once('/').map(|(parent, _)| parent.to_string())
}

/// Every ancestor directory of a relative path, nearest first.
fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = path;
    while let Some((parent, _)) = current.rsplit_once('/') {
        result.push(parent.to_string());
        current = parent;
    }
    result
}
