//! Phase 7: type-reference resolution.
//!
//! Walks each symbol's recorded parameter types, return type, and
//! variable-annotation types, resolves the type names against
//! Class/Interface/TypeAlias/Enum nodes, and emits USES_TYPE edges with
//! the `role` the occurrence came from. A (source, target, role) triple
//! is written at most once (enforced by edge identity).

use std::collections::HashMap;

use rayon::prelude::*;

use crate::graph::{GraphEdge, KnowledgeGraph, NodeKind};

use super::parse::FileParseData;

/// Kinds a type name may resolve to.
const TYPE_KINDS: [NodeKind; 4] = [
    NodeKind::Class,
    NodeKind::Interface,
    NodeKind::TypeAlias,
    NodeKind::Enum,
];

/// Resolve type annotations into USES_TYPE edges.
///
/// Resolution is parallel per file over a frozen name index; edges drain
/// into the graph sequentially.
pub fn process_types(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    // name -> (id, file_path) candidates, id-ordered.
    let mut index: HashMap<String, Vec<(String, String)>> = HashMap::new();
    for kind in TYPE_KINDS {
        for node in graph.nodes_by_kind(kind) {
            index
                .entry(node.name.clone())
                .or_default()
                .push((node.id.clone(), node.file_path.clone()));
        }
    }

    // Span index per file for the enclosing symbol of each annotation.
    let mut spans: HashMap<String, Vec<(usize, usize, String)>> = HashMap::new();
    for node in graph.nodes() {
        if node.kind.is_symbol() {
            spans.entry(node.file_path.clone()).or_default().push((
                node.start_line,
                node.end_line,
                node.id.clone(),
            ));
        }
    }

    let edges: Vec<GraphEdge> = parse_data
        .par_iter()
        .flat_map_iter(|fpd| {
            let mut file_edges = Vec::new();
            for type_ref in &fpd.output.type_refs {
                let Some(source) = containing_symbol(&spans, &fpd.path, type_ref.line) else {
                    continue;
                };
                let Some(target) = resolve(&type_ref.name, &fpd.path, &index) else {
                    continue;
                };
                if source == target {
                    continue;
                }
                file_edges.push(GraphEdge::uses_type(source, target, type_ref.role));
            }
            file_edges
        })
        .collect();

    for edge in edges {
        graph.add_edge(edge);
    }
}

/// Innermost symbol whose span contains the annotation line.
fn containing_symbol(
    spans: &HashMap<String, Vec<(usize, usize, String)>>,
    file_path: &str,
    line: usize,
) -> Option<String> {
    spans
        .get(file_path)?
        .iter()
        .filter(|(start, end, _)| *start <= line && line <= *end)
        .min_by_key(|(start, end, _)| end - start)
        .map(|(_, _, id)| id.clone())
}

/// Same-file first, then the first candidate in id order.
fn resolve(
    name: &str,
    file_path: &str,
    index: &HashMap<String, Vec<(String, String)>>,
) -> Option<String> {
    let candidates = index.get(name)?;
    candidates
        .iter()
        .find(|(_, path)| path == file_path)
        .or_else(|| candidates.first())
        .map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::AnalysisConfig;
    use crate::graph::{EdgeType, TypeRole};
    use crate::pipeline::parse::process_parsing;
    use crate::pipeline::structure::process_structure;
    use crate::pipeline::walker::FileEntry;

    fn entry(path: &str, source: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            source: source.as_bytes().to_vec(),
            language: crate::ingest::detect_language(std::path::Path::new(path)),
            is_binary: false,
        }
    }

    fn build(entries: Vec<FileEntry>) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let config = AnalysisConfig::default();
        process_structure(&entries, &mut graph);
        let parse_data =
            process_parsing(entries, &mut graph, &config, &CancellationToken::new()).unwrap();
        process_types(&parse_data, &mut graph);
        graph
    }

    #[test]
    fn test_param_role() {
        let graph = build(vec![entry(
            "a.py",
            "class User:\n    pass\n\ndef login(user: User):\n    pass\n",
        )]);
        let edges = graph.outgoing("function:a.py:login", Some(EdgeType::UsesType));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "class:a.py:User");
        assert_eq!(edges[0].role, Some(TypeRole::Param));
    }

    #[test]
    fn test_return_role() {
        let graph = build(vec![entry(
            "a.py",
            "class Session:\n    pass\n\ndef login() -> Session:\n    pass\n",
        )]);
        let edges = graph.outgoing("function:a.py:login", Some(EdgeType::UsesType));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].role, Some(TypeRole::Return));
    }

    #[test]
    fn test_variable_role_inside_function() {
        let graph = build(vec![entry(
            "a.py",
            "class Config:\n    pass\n\ndef load():\n    cfg: Config = Config()\n",
        )]);
        let edges = graph.outgoing("function:a.py:load", Some(EdgeType::UsesType));
        assert!(edges
            .iter()
            .any(|e| e.role == Some(TypeRole::Variable) && e.target == "class:a.py:Config"));
    }

    #[test]
    fn test_triple_unique() {
        // The same (function, type, param) triple twice yields one edge.
        let graph = build(vec![entry(
            "a.py",
            "class User:\n    pass\n\ndef merge(a: User, b: User):\n    pass\n",
        )]);
        let edges = graph.outgoing("function:a.py:merge", Some(EdgeType::UsesType));
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn test_unresolved_type_dropped() {
        let graph = build(vec![entry(
            "a.py",
            "def login(user: ExternalUser):\n    pass\n",
        )]);
        let edges = graph.outgoing("function:a.py:login", Some(EdgeType::UsesType));
        assert!(edges.is_empty());
    }

    #[test]
    fn test_interface_and_alias_targets() {
        let graph = build(vec![entry(
            "a.ts",
            "interface Shape {}\ntype Points = number;\nfunction draw(s: Shape, p: Points): void {}\n",
        )]);
        let edges = graph.outgoing("function:a.ts:draw", Some(EdgeType::UsesType));
        let targets: Vec<_> = edges.iter().map(|e| e.target.as_str()).collect();
        assert!(targets.contains(&"interface:a.ts:Shape"));
        assert!(targets.contains(&"type_alias:a.ts:Points"));
    }

    #[test]
    fn test_annotations_outside_symbols_skipped() {
        // Module-level annotation with no enclosing symbol: no edge.
        let graph = build(vec![entry(
            "a.py",
            "class Config:\n    pass\n\ncfg: Config = Config()\n",
        )]);
        let all_uses: Vec<_> = graph
            .edges()
            .filter(|e| e.edge_type == EdgeType::UsesType)
            .collect();
        // Only the Config class could be a source, and self-references
        // are dropped, so nothing is emitted.
        assert!(all_uses.is_empty());
    }
}
