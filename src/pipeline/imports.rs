//! Phase 4: import resolution.
//!
//! Resolves raw import specifiers to File node ids and emits IMPORTS
//! edges carrying the imported symbol names.
//!
//! Resolution rules:
//! - Relative specifiers resolve against the importing file's directory,
//!   trying a closed extension list in fixed order, then `index.*`
//!   (TS/JS) or `__init__.py` (Python) fallbacks.
//! - Package-absolute specifiers join against the configured source roots.
//! - Bare specifiers that resolve nowhere in-repo produce no edge and no
//!   error.
//!
//! Ties break by: explicit extension match > directory-index match >
//! lexicographic order of path.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::AnalysisConfig;
use crate::graph::{node_id, EdgeType, GraphEdge, KnowledgeGraph, NodeKind};
use crate::ingest::{ImportRecord, Language};

use super::parse::FileParseData;

/// Extension try order for TS/JS relative specifiers.
const TS_JS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Resolve imports for all parsed files and write IMPORTS edges.
///
/// Imported-name lists for the same (importer, imported) file pair are
/// merged into one edge.
pub fn process_imports(
    parse_data: &[FileParseData],
    graph: &mut KnowledgeGraph,
    config: &AnalysisConfig,
) {
    // The resolvable universe: every File node path.
    let files: BTreeSet<String> = graph
        .nodes_by_kind(NodeKind::File)
        .map(|n| n.file_path.clone())
        .collect();

    // (importer, imported) -> union of imported names.
    let mut pairs: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

    for fpd in parse_data {
        for record in &fpd.output.imports {
            let Some(target) =
                resolve_import(&fpd.path, fpd.language, record, &files, &config.source_roots)
            else {
                continue;
            };
            if target == fpd.path {
                continue;
            }
            pairs
                .entry((fpd.path.clone(), target))
                .or_default()
                .extend(record.names.iter().cloned());
        }
    }

    for ((importer, imported), names) in pairs {
        let mut edge = GraphEdge::new(
            EdgeType::Imports,
            node_id(NodeKind::File, &importer, ""),
            node_id(NodeKind::File, &imported, ""),
        );
        edge.symbols = names.into_iter().collect();
        graph.add_edge(edge);
    }
}

/// Resolve one specifier to an in-repo file path.
pub fn resolve_import(
    importing_file: &str,
    language: Language,
    record: &ImportRecord,
    files: &BTreeSet<String>,
    source_roots: &[String],
) -> Option<String> {
    match language {
        Language::Python => resolve_python(importing_file, record, files, source_roots),
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            resolve_ts_js(importing_file, record, files, source_roots)
        }
        Language::CSharp => resolve_dotted_absolute(&record.module, "cs", files, source_roots),
    }
}

fn resolve_ts_js(
    importing_file: &str,
    record: &ImportRecord,
    files: &BTreeSet<String>,
    source_roots: &[String],
) -> Option<String> {
    if record.is_relative {
        let dir = dirname(importing_file);
        let base = normalize_joined(&dir, &record.module)?;

        // Explicit extension match first.
        if files.contains(&base) {
            return Some(base);
        }
        for ext in TS_JS_EXTENSIONS {
            let candidate = format!("{base}.{ext}");
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
        // Directory-index fallback.
        for ext in TS_JS_EXTENSIONS {
            let candidate = format!("{base}/index.{ext}");
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
        return None;
    }

    // Bare or package-absolute specifier: join against source roots.
    let mut direct = BTreeSet::new();
    let mut index = BTreeSet::new();
    for root in source_roots {
        let base = join_root(root, &record.module);
        if files.contains(&base) {
            direct.insert(base.clone());
            continue;
        }
        for ext in TS_JS_EXTENSIONS {
            let candidate = format!("{base}.{ext}");
            if files.contains(&candidate) {
                direct.insert(candidate);
            }
            let candidate = format!("{base}/index.{ext}");
            if files.contains(&candidate) {
                index.insert(candidate);
            }
        }
    }
    // Lexicographic order inside each class via BTreeSet iteration.
    direct.into_iter().next().or_else(|| index.into_iter().next())
}

fn resolve_python(
    importing_file: &str,
    record: &ImportRecord,
    files: &BTreeSet<String>,
    source_roots: &[String],
) -> Option<String> {
    if record.is_relative {
        let dots = record.module.chars().take_while(|&c| c == '.').count();
        let rest = &record.module[dots..];

        // One dot anchors at the importing file's package; each further
        // dot walks one package up.
        let mut dir = dirname(importing_file);
        for _ in 1..dots {
            dir = dirname(&dir);
        }

        let base = if rest.is_empty() {
            dir.clone()
        } else if dir.is_empty() {
            rest.replace('.', "/")
        } else {
            format!("{}/{}", dir, rest.replace('.', "/"))
        };

        let module_candidate = format!("{base}.py");
        if files.contains(&module_candidate) {
            return Some(module_candidate);
        }
        let package_candidate = if base.is_empty() {
            "__init__.py".to_string()
        } else {
            format!("{base}/__init__.py")
        };
        if files.contains(&package_candidate) {
            return Some(package_candidate);
        }
        return None;
    }

    resolve_dotted_absolute(&record.module, "py", files, source_roots)
}

/// Package-absolute dotted specifier (`src.a.b`, `App.Services`) joined
/// against the source roots. Module-file matches beat package-index
/// matches; lexicographic order breaks remaining ties.
fn resolve_dotted_absolute(
    module: &str,
    ext: &str,
    files: &BTreeSet<String>,
    source_roots: &[String],
) -> Option<String> {
    let rel = module.replace('.', "/");
    let mut direct = BTreeSet::new();
    let mut index = BTreeSet::new();

    for root in source_roots {
        let base = join_root(root, &rel);
        let candidate = format!("{base}.{ext}");
        if files.contains(&candidate) {
            direct.insert(candidate);
        }
        if ext == "py" {
            let candidate = format!("{base}/__init__.py");
            if files.contains(&candidate) {
                index.insert(candidate);
            }
        }
    }

    direct.into_iter().next().or_else(|| index.into_iter().next())
}

fn dirname(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

fn join_root(root: &str, rel: &str) -> String {
    if root.is_empty() {
        rel.to_string()
    } else {
        format!("{root}/{rel}")
    }
}

/// Join a relative specifier (`./x`, `../y/z`) onto a directory and
/// normalize away `.` and `..` segments. Escaping above the repo root
/// yields `None`.
fn normalize_joined(dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}
