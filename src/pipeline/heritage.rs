//! Phase 6: heritage resolution.
//!
//! Turns each class's syntactic base list into EXTENDS / IMPLEMENTS
//! edges. The resolved target's kind decides the edge type: a base that
//! resolves to a Class yields EXTENDS, one that resolves to an Interface
//! yields IMPLEMENTS. Unresolved bases (external library types) are
//! dropped silently.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::{EdgeType, GraphEdge, KnowledgeGraph, NodeKind};

use super::parse::FileParseData;

/// Resolve heritage declarations into EXTENDS / IMPLEMENTS edges.
pub fn process_heritage(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    // name -> candidate ids over Class and Interface nodes. Candidates
    // stay sorted (graph iteration is id-ordered).
    let mut index: HashMap<String, Vec<(String, NodeKind, String)>> = HashMap::new();
    for kind in [NodeKind::Class, NodeKind::Interface] {
        for node in graph.nodes_by_kind(kind) {
            index.entry(node.name.clone()).or_default().push((
                node.id.clone(),
                node.kind,
                node.file_path.clone(),
            ));
        }
    }

    let mut edges = Vec::new();
    for fpd in parse_data {
        for record in &fpd.output.heritage {
            let Some(child) = resolve(&record.child, &fpd.path, &index) else {
                debug!(
                    "unresolved heritage child {} in {}",
                    record.child, fpd.path
                );
                continue;
            };
            let Some(parent) = resolve(&record.parent, &fpd.path, &index) else {
                debug!(
                    "unresolved heritage parent {} for {} in {}",
                    record.parent, record.child, fpd.path
                );
                continue;
            };

            let edge_type = match parent.1 {
                NodeKind::Interface => EdgeType::Implements,
                _ => EdgeType::Extends,
            };
            edges.push(GraphEdge::new(edge_type, child.0, parent.0));
        }
    }

    for edge in edges {
        graph.add_edge(edge);
    }
}

/// Resolve a name to (id, kind), preferring a same-file definition and
/// falling back to the first candidate (cross-file reference).
fn resolve(
    name: &str,
    file_path: &str,
    index: &HashMap<String, Vec<(String, NodeKind, String)>>,
) -> Option<(String, NodeKind)> {
    let candidates = index.get(name)?;
    candidates
        .iter()
        .find(|(_, _, path)| path == file_path)
        .or_else(|| candidates.first())
        .map(|(id, kind, _)| (id.clone(), *kind))
}
