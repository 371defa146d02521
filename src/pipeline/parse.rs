//! Phase 3: code parsing.
//!
//! Parses every dispatchable file in parallel (rayon worker threads with
//! thread-local parsers) and inserts symbol nodes plus DEFINES/EXPORTS
//! edges through the single-writer sink. Raw parse outputs are returned
//! for the resolver phases; nothing cross-file is resolved here.

use anyhow::Result;
use rayon::prelude::*;
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::config::AnalysisConfig;
use crate::graph::{node_id, sink, EdgeType, GraphEdge, GraphNode, KnowledgeGraph, NodeKind};
use crate::ingest::pool::with_parser;
use crate::ingest::{csharp, python, typescript, Language, ParseOutput, SymbolRecord};

use super::walker::FileEntry;

/// One file's parse result, handed to the resolver phases.
#[derive(Debug, Clone)]
pub struct FileParseData {
    pub path: String,
    pub language: Language,
    pub output: ParseOutput,
    pub parse_failed: bool,
}

/// Parse all files and populate symbol nodes.
///
/// # Behavior
/// - Parallel per file; graph writes serialized through the sink.
/// - Parse failure keeps the File node, sets `parse_failed = true`, and
///   contributes zero symbols; the pipeline continues.
/// - Symbol node ids are `{kind}:{path}:{qualified_name}`.
pub fn process_parsing(
    entries: Vec<FileEntry>,
    graph: &mut KnowledgeGraph,
    config: &AnalysisConfig,
    cancel: &CancellationToken,
) -> Result<Vec<FileParseData>> {
    let snippet_limit = config.body_snippet_limit;
    let cancel_producer = cancel.clone();

    let (graph_sink, rx) = sink::bounded(512);

    let producer = std::thread::spawn(move || -> Vec<FileParseData> {
        entries
            .into_par_iter()
            .map_with(graph_sink, |s, entry| {
                if cancel_producer.is_cancelled() {
                    return None;
                }
                let language = entry.language?;
                let parsed = parse_one(language, &entry.source);

                let Some(output) = parsed else {
                    warn!("parse failed for {}", entry.path);
                    return Some(FileParseData {
                        path: entry.path,
                        language,
                        output: ParseOutput::default(),
                        parse_failed: true,
                    });
                };

                emit_symbols(s, &entry.path, language, &output, snippet_limit);
                Some(FileParseData {
                    path: entry.path,
                    language,
                    output,
                    parse_failed: false,
                })
            })
            .flatten()
            .collect()
    });

    sink::drain(rx, graph);
    let parse_data = producer
        .join()
        .map_err(|_| anyhow::anyhow!("parser worker panicked"))?;

    // Flag failed files on their File nodes.
    for fpd in &parse_data {
        if fpd.parse_failed {
            let file_id = node_id(NodeKind::File, &fpd.path, "");
            if let Some(file_node) = graph.get_node_mut(&file_id) {
                file_node.parse_failed = true;
            }
        }
    }

    cancel.check()?;

    // Deterministic order for the resolver phases.
    let mut parse_data = parse_data;
    parse_data.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(parse_data)
}

fn parse_one(language: Language, source: &[u8]) -> Option<ParseOutput> {
    let result = with_parser(language, |parser| match language {
        Language::Python => python::parse(parser, source),
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            typescript::parse(parser, source)
        }
        Language::CSharp => csharp::parse(parser, source),
    });
    match result {
        Ok(output) => output,
        Err(e) => {
            warn!("parser init failed: {e}");
            None
        }
    }
}

fn emit_symbols(
    s: &mut sink::GraphSink,
    path: &str,
    language: Language,
    output: &ParseOutput,
    snippet_limit: usize,
) {
    let file_id = node_id(NodeKind::File, path, "");

    for record in &output.symbols {
        let symbol_id = node_id(record.category.node_kind(), path, &record.qualified_name());
        let node = symbol_node(&symbol_id, path, language, record, output, snippet_limit);
        let exported = node.is_exported;

        s.node(node);
        s.edge(GraphEdge::new(EdgeType::Defines, file_id.clone(), symbol_id.clone()));
        if exported {
            s.edge(GraphEdge::new(EdgeType::Exports, file_id.clone(), symbol_id));
        }
    }
}

fn symbol_node(
    symbol_id: &str,
    path: &str,
    language: Language,
    record: &SymbolRecord,
    output: &ParseOutput,
    snippet_limit: usize,
) -> GraphNode {
    let mut node = GraphNode::new(
        record.category.node_kind(),
        symbol_id,
        record.qualified_name(),
    );
    node.file_path = path.to_string();
    node.language = language.as_str().to_string();
    node.start_line = record.start_line;
    node.end_line = record.end_line;
    node.signature = record.signature.clone();
    node.body = truncate_utf8(&record.body, snippet_limit);
    node.class_name = record.class_name.clone();
    node.decorators = record.decorators.clone();
    node.bases_syntactic = record.bases.clone();
    node.methods_declared = record.methods_declared.clone();
    node.variants = record.variants.clone();
    node.target_syntactic = record.target_syntactic.clone();
    node.arity = record.arity;
    node.is_exported = record.is_exported || output.exports.contains(&record.name);
    node.is_test = is_test_symbol(record);
    node.is_ctor = record.is_ctor;
    node.is_property = record.is_property;
    node.is_stub = record.is_stub;
    node
}

/// Test symbols: `test_*` names (pytest convention) or a test attribute.
fn is_test_symbol(record: &SymbolRecord) -> bool {
    if record.name.starts_with("test_") {
        return true;
    }
    record
        .decorators
        .iter()
        .any(|d| matches!(d.as_str(), "Fact" | "Test" | "TestMethod" | "Theory"))
}

/// Truncate on a char boundary at most `limit` bytes in.
fn truncate_utf8(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
