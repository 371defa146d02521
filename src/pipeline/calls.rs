//! Phase 5: call tracing.
//!
//! Binds each raw call site to zero or more callee symbol ids, writing a
//! CALLS edge per binding with a confidence score:
//!
//! | rule | confidence |
//! |---|---|
//! | unique name match in same file or an imported file | 1.0 |
//! | method resolved via known receiver static type | 0.8 |
//! | unique symbol globally by name | 0.6 |
//! | fuzzy unique (edit distance <= 2) | 0.5 |
//! | ambiguous, up to 3 edges | 0.4 |
//!
//! A blocklist of builtins, runtime globals, framework hooks, and BCL
//! noise is consulted first; matches never produce edges. Self-loops are
//! permitted only when the receiver type differs from the caller's owning
//! class. Confidence ties on the same (caller, callee) pair keep the
//! maximum (enforced by the graph).
//!
//! Instantiation sites (`new Type(...)`) arrive as `Type.ctor` names and
//! bind the declared constructor method; a class without an explicit
//! constructor falls back to the class node itself.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::graph::{EdgeType, GraphEdge, KnowledgeGraph, NodeKind};
use crate::ingest::CallSite;

use super::parse::FileParseData;

/// Names that never produce CALLS edges: language builtins, web/runtime
/// globals, framework hook names, and base-class-library methods whose
/// definitions do not live in the repository.
pub const CALL_BLOCKLIST: &[&str] = &[
    // Python builtins
    "print", "len", "range", "map", "filter", "sorted", "list", "dict", "set", "str", "int",
    "float", "bool", "type", "super", "isinstance", "issubclass", "hasattr", "getattr",
    "setattr", "open", "iter", "next", "zip", "enumerate", "any", "all", "min", "max", "sum",
    "abs", "round", "repr", "id", "hash", "dir", "vars", "input", "format", "tuple",
    "frozenset", "bytes", "bytearray", "memoryview", "object", "property", "classmethod",
    "staticmethod", "delattr", "callable", "compile", "eval", "exec", "globals", "locals",
    "breakpoint", "exit", "quit",
    // Python stdlib method names that collide with user symbols
    "append", "extend", "update", "pop", "get", "items", "keys", "values", "split", "join",
    "strip", "replace", "startswith", "endswith", "lower", "upper", "encode", "decode", "read",
    "write", "close",
    // JS/TS runtime globals
    "console", "setTimeout", "setInterval", "clearTimeout", "clearInterval", "JSON", "Array",
    "Object", "Promise", "Math", "Date", "Error", "Symbol", "parseInt", "parseFloat", "isNaN",
    "isFinite", "encodeURIComponent", "decodeURIComponent", "fetch", "require", "exports",
    "module", "document", "window", "process", "Buffer", "URL",
    // JS/TS dotted method names extracted as bare call names
    "log", "error", "warn", "info", "debug", "parse", "stringify", "assign", "freeze",
    "isArray", "from", "of", "resolve", "reject", "race", "floor", "ceil", "random",
    // React hooks
    "useState", "useEffect", "useRef", "useCallback", "useMemo", "useContext", "useReducer",
    "useLayoutEffect", "useImperativeHandle", "useDebugValue", "useId", "useTransition",
    "useDeferredValue",
    // C# / .NET builtins and common BCL methods
    "Console", "WriteLine", "ReadLine", "Write", "ToString", "GetType", "Equals",
    "GetHashCode", "ReferenceEquals", "Convert", "String", "Int32", "Int64", "Double",
    "Boolean", "Decimal", "Guid", "DateTime", "TimeSpan", "Task", "Thread", "Dispose", "GC",
    "Environment", "Add", "Remove", "Contains", "Clear", "Count", "Select", "Where",
    "OrderBy", "GroupBy", "First", "FirstOrDefault", "ToList", "ToArray", "ToDictionary",
    "Any", "All", "Concat", "Skip", "Take", "Distinct", "ConfigureAwait", "GetAwaiter",
    "GetResult", "AddSingleton", "AddScoped", "AddTransient", "AddControllers",
    "AddSwaggerGen", "UseSwagger",
];

fn is_blocklisted(name: &str) -> bool {
    CALL_BLOCKLIST.contains(&name)
}

/// Read-only snapshot of one callable symbol for resolution.
#[derive(Debug, Clone)]
struct SymbolSnap {
    id: String,
    /// Simple name: `save` for the method node `User.save`.
    simple_name: String,
    kind: NodeKind,
    file_path: String,
    class_name: String,
    start_line: usize,
    end_line: usize,
}

/// Frozen view of the graph the tracer resolves against.
struct Snapshot {
    /// simple name -> candidate ids, candidates sorted by id.
    by_name: HashMap<String, Vec<usize>>,
    /// file path -> symbol indexes, sorted by span start.
    by_file: HashMap<String, Vec<usize>>,
    /// importer path -> (imported path, imported names).
    imports: HashMap<String, Vec<(String, Vec<String>)>>,
    symbols: Vec<SymbolSnap>,
    by_id: HashMap<String, usize>,
}

impl Snapshot {
    fn build(graph: &KnowledgeGraph) -> Self {
        let mut symbols = Vec::new();
        for node in graph.nodes() {
            if !node.kind.is_callable() {
                continue;
            }
            let simple_name = node
                .name
                .rsplit('.')
                .next()
                .unwrap_or(&node.name)
                .to_string();
            symbols.push(SymbolSnap {
                id: node.id.clone(),
                simple_name,
                kind: node.kind,
                file_path: node.file_path.clone(),
                class_name: node.class_name.clone(),
                start_line: node.start_line,
                end_line: node.end_line,
            });
        }
        symbols.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_file: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::new();
        for (i, snap) in symbols.iter().enumerate() {
            by_name.entry(snap.simple_name.clone()).or_default().push(i);
            by_file.entry(snap.file_path.clone()).or_default().push(i);
            by_id.insert(snap.id.clone(), i);
        }
        for indexes in by_file.values_mut() {
            indexes.sort_by_key(|&i| symbols[i].start_line);
        }

        let mut imports: HashMap<String, Vec<(String, Vec<String>)>> = HashMap::new();
        for node in graph.nodes_by_kind(NodeKind::File) {
            let mut targets = Vec::new();
            for edge in graph.outgoing(&node.id, Some(EdgeType::Imports)) {
                let target_path = edge.target.trim_start_matches("file:").to_string();
                targets.push((target_path, edge.symbols.clone()));
            }
            if !targets.is_empty() {
                imports.insert(node.file_path.clone(), targets);
            }
        }

        Self {
            by_name,
            by_file,
            imports,
            symbols,
            by_id,
        }
    }

    /// Innermost callable symbol whose span contains `line`.
    fn containing_symbol(&self, file_path: &str, line: usize) -> Option<&SymbolSnap> {
        let indexes = self.by_file.get(file_path)?;
        indexes
            .iter()
            .map(|&i| &self.symbols[i])
            .filter(|s| s.start_line <= line && line <= s.end_line)
            .min_by_key(|s| s.end_line - s.start_line)
    }

    fn candidates(&self, name: &str) -> Vec<&SymbolSnap> {
        self.by_name
            .get(name)
            .map(|v| v.iter().map(|&i| &self.symbols[i]).collect())
            .unwrap_or_default()
    }
}

/// One resolved binding before it becomes an edge.
#[derive(Debug)]
struct Binding {
    caller: String,
    callee: String,
    confidence: f64,
}

/// Resolve all call sites and write CALLS edges.
///
/// Resolution runs parallel per file over a frozen snapshot; the produced
/// edges are drained into the graph sequentially.
pub fn process_calls(parse_data: &[FileParseData], graph: &mut KnowledgeGraph) {
    let snapshot = Snapshot::build(graph);

    let bindings: Vec<Binding> = parse_data
        .par_iter()
        .flat_map_iter(|fpd| resolve_file(fpd, &snapshot))
        .collect();

    for binding in bindings {
        graph.add_edge(GraphEdge::calls(
            binding.caller,
            binding.callee,
            binding.confidence,
        ));
    }
}

fn resolve_file(fpd: &FileParseData, snapshot: &Snapshot) -> Vec<Binding> {
    let mut bindings = Vec::new();

    for call in &fpd.output.calls {
        let Some(caller) = snapshot.containing_symbol(&fpd.path, call.line) else {
            continue;
        };

        // A blocklisted callee name kills the direct binding but not the
        // arguments: `setTimeout(tick, 100)` still resolves `tick`.
        let is_self_receiver = matches!(call.receiver.as_str(), "self" | "this");
        if !is_blocklisted(&call.name) || is_self_receiver {
            resolve_site(call, caller, &fpd.path, snapshot, &mut bindings);
        }

        // Callback arguments: bare identifiers passed as arguments
        // resolve at a 0.8 discount of their rule confidence.
        for arg_name in &call.arguments {
            if is_blocklisted(arg_name) {
                continue;
            }
            if let Some((target, confidence)) =
                resolve_by_name(arg_name, &fpd.path, snapshot).into_single()
            {
                push_binding(caller, &target, confidence * 0.8, snapshot, &mut bindings);
            }
        }
    }

    // Decorators are implicit calls: @require_auth on a function is
    // equivalent to require_auth(func).
    for record in &fpd.output.symbols {
        if record.decorators.is_empty() {
            continue;
        }
        let source_id = crate::graph::node_id(
            record.category.node_kind(),
            &fpd.path,
            &record.qualified_name(),
        );
        let Some(&caller_idx) = snapshot.by_id.get(&source_id) else {
            continue;
        };
        let caller = &snapshot.symbols[caller_idx];

        for decorator in &record.decorators {
            let base_name = decorator.rsplit('.').next().unwrap_or(decorator);
            if is_blocklisted(base_name) {
                continue;
            }
            let resolved = resolve_by_name(base_name, &fpd.path, snapshot)
                .into_single()
                .or_else(|| resolve_by_name(decorator, &fpd.path, snapshot).into_single());
            if let Some((target, confidence)) = resolved {
                push_binding(caller, &target, confidence, snapshot, &mut bindings);
            }
        }
    }

    bindings
}

fn resolve_site(
    call: &CallSite,
    caller: &SymbolSnap,
    file_path: &str,
    snapshot: &Snapshot,
    bindings: &mut Vec<Binding>,
) {
    // self/this: the callee is a method of the caller's own class.
    if matches!(call.receiver.as_str(), "self" | "this") {
        let target = snapshot
            .candidates(&call.name)
            .into_iter()
            .find(|s| {
                s.kind == NodeKind::Method
                    && s.file_path == file_path
                    && s.class_name == caller.class_name
            })
            .map(|s| s.id.clone());
        if let Some(target) = target {
            push_binding(caller, &target, 1.0, snapshot, bindings);
        }
        return;
    }

    // Known receiver static type: the method on that type, 0.8. The
    // explicit type suppresses all name-only fallbacks; a name-only match
    // here would fabricate self-loops (GetAll -> GetAll) whenever the
    // called name also exists on the caller's class.
    if !call.receiver.is_empty() {
        if let Some(receiver_type) = &call.receiver_type {
            let target = resolve_method_on(&call.name, receiver_type, file_path, snapshot);
            if let Some(target) = target {
                push_binding(caller, &target, 0.8, snapshot, bindings);
            }
            return;
        }

        // Receiver without a type: only a static-style match where the
        // receiver text itself names the owning class.
        if let Some(target) = resolve_method_on(&call.name, &call.receiver, file_path, snapshot) {
            push_binding(caller, &target, 0.8, snapshot, bindings);
        }
        return;
    }

    // `new Type(...)` sites arrive as `Type.ctor`. Bind the declared
    // constructor method; a class without an explicit constructor falls
    // back to the class node itself. BCL/runtime type names stay blocked
    // in the fallback (`new Date()` must not fuzzy-match user symbols).
    if let Some(class_name) = call.name.strip_suffix(".ctor") {
        if let Some(target) = resolve_method_on("ctor", class_name, file_path, snapshot) {
            let same_file = snapshot
                .by_id
                .get(&target)
                .is_some_and(|&i| snapshot.symbols[i].file_path == file_path);
            let confidence = if same_file { 1.0 } else { 0.8 };
            push_binding(caller, &target, confidence, snapshot, bindings);
            return;
        }
        if is_blocklisted(class_name) {
            return;
        }
        match resolve_by_name(class_name, file_path, snapshot) {
            Resolution::Unique(target, confidence) => {
                push_binding(caller, &target, confidence, snapshot, bindings);
            }
            Resolution::Ambiguous(targets) => {
                for target in targets.into_iter().take(3) {
                    push_binding(caller, &target, 0.4, snapshot, bindings);
                }
            }
            Resolution::None => {}
        }
        return;
    }

    // Plain call: the confidence ladder.
    match resolve_by_name(&call.name, file_path, snapshot) {
        Resolution::Unique(target, confidence) => {
            push_binding(caller, &target, confidence, snapshot, bindings);
        }
        Resolution::Ambiguous(targets) => {
            for target in targets.into_iter().take(3) {
                push_binding(caller, &target, 0.4, snapshot, bindings);
            }
        }
        Resolution::None => {}
    }
}

/// A method named `name` whose owning class is `class_name`, same file
/// preferred over global.
fn resolve_method_on(
    name: &str,
    class_name: &str,
    file_path: &str,
    snapshot: &Snapshot,
) -> Option<String> {
    let candidates: Vec<&SymbolSnap> = snapshot
        .candidates(name)
        .into_iter()
        .filter(|s| s.kind == NodeKind::Method && s.class_name == class_name)
        .collect();

    candidates
        .iter()
        .find(|s| s.file_path == file_path)
        .or_else(|| candidates.first())
        .map(|s| s.id.clone())
}

enum Resolution {
    Unique(String, f64),
    Ambiguous(Vec<String>),
    None,
}

impl Resolution {
    fn into_single(self) -> Option<(String, f64)> {
        match self {
            Resolution::Unique(target, confidence) => Some((target, confidence)),
            _ => None,
        }
    }
}

/// The name-resolution ladder for receiverless calls.
fn resolve_by_name(name: &str, file_path: &str, snapshot: &Snapshot) -> Resolution {
    let candidates = snapshot.candidates(name);

    if !candidates.is_empty() {
        // 1. Same file.
        let same_file: Vec<_> = candidates
            .iter()
            .filter(|s| s.file_path == file_path)
            .collect();
        match same_file.len() {
            1 => return Resolution::Unique(same_file[0].id.clone(), 1.0),
            n if n > 1 => {
                return Resolution::Ambiguous(
                    same_file.iter().map(|s| s.id.clone()).collect(),
                )
            }
            _ => {}
        }

        // 2. Imported files where this name (or the whole module) was
        //    brought in.
        if let Some(imports) = snapshot.imports.get(file_path) {
            let imported_paths: Vec<&String> = imports
                .iter()
                .filter(|(_, names)| names.is_empty() || names.iter().any(|n| n == name))
                .map(|(path, _)| path)
                .collect();
            let imported: Vec<_> = candidates
                .iter()
                .filter(|s| imported_paths.iter().any(|p| *p == &s.file_path))
                .collect();
            match imported.len() {
                1 => return Resolution::Unique(imported[0].id.clone(), 1.0),
                n if n > 1 => {
                    return Resolution::Ambiguous(
                        imported.iter().map(|s| s.id.clone()).collect(),
                    )
                }
                _ => {}
            }
        }

        // 3. Global by name.
        match candidates.len() {
            1 => return Resolution::Unique(candidates[0].id.clone(), 0.6),
            _ => {
                return Resolution::Ambiguous(
                    candidates.iter().map(|s| s.id.clone()).collect(),
                )
            }
        }
    }

    // 4. Fuzzy: a unique name within edit distance 2 that itself has a
    //    unique definition.
    let mut fuzzy_names: Vec<&String> = snapshot
        .by_name
        .keys()
        .filter(|candidate| edit_distance_at_most(name, candidate, 2))
        .collect();
    fuzzy_names.sort();
    if fuzzy_names.len() == 1 {
        let matches = snapshot.candidates(fuzzy_names[0]);
        if matches.len() == 1 {
            return Resolution::Unique(matches[0].id.clone(), 0.5);
        }
    }

    Resolution::None
}

fn push_binding(
    caller: &SymbolSnap,
    target: &str,
    confidence: f64,
    snapshot: &Snapshot,
    bindings: &mut Vec<Binding>,
) {
    // Self-loops only when the receiver's class differs from the
    // caller's owning class. A caller can never "call itself" through
    // name matching alone.
    if target == caller.id {
        let target_class = snapshot
            .by_id
            .get(target)
            .map(|&i| snapshot.symbols[i].class_name.as_str())
            .unwrap_or("");
        if target_class == caller.class_name {
            return;
        }
    }

    bindings.push(Binding {
        caller: caller.id.clone(),
        callee: target.to_string(),
        confidence,
    });
}

/// Bounded Levenshtein distance check (distance <= `max`), linear-space DP
/// with an early row cutoff.
fn edit_distance_at_most(a: &str, b: &str, max: usize) -> bool {
    if a == b {
        // Exact matches are handled by earlier tiers.
        return false;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max {
        return false;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (prev[j + 1] + 1).min(current[j] + 1).min(prev[j] + cost);
            row_min = row_min.min(current[j + 1]);
        }
        if row_min > max {
            return false;
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b.len()] <= max
}
