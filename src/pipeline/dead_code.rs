//! Phase 10: dead-code detection.
//!
//! Five passes producing `is_dead` flags:
//!
//! 1. Candidates: symbols with no incoming CALLS and not imported by any
//!    file.
//! 2. Exemptions: entry points, exported symbols, constructors, dunder
//!    methods, `__init__.*` files, test files/symbols, decorated symbols,
//!    properties.
//! 3. Override pass: a method that overrides a non-dead ancestor method
//!    (name + arity, breadth-first over EXTENDS) is un-flagged.
//! 4. Protocol conformance: methods on classes that IMPLEMENT an
//!    interface declaring that method are un-flagged.
//! 5. Protocol stubs: methods declared on an Interface are contracts and
//!    are always un-flagged.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::graph::{EdgeType, KnowledgeGraph, NodeKind};

/// Symbol kinds eligible for dead-code analysis.
const DEAD_CODE_KINDS: [NodeKind; 3] = [NodeKind::Function, NodeKind::Method, NodeKind::Class];

/// Run all five passes. Returns the number of symbols left flagged dead.
pub fn process_dead_code(graph: &mut KnowledgeGraph) -> usize {
    // Names imported anywhere, per target file: a symbol whose name is in
    // its own file's imported-name set counts as used. A whole-module
    // import (empty name list) makes every symbol of the file reachable.
    let mut imported_names: HashMap<String, HashSet<String>> = HashMap::new();
    let mut module_imported: HashSet<String> = HashSet::new();
    for edge in graph.edges() {
        if edge.edge_type != EdgeType::Imports {
            continue;
        }
        let target_path = edge.target.trim_start_matches("file:").to_string();
        if edge.symbols.is_empty() {
            module_imported.insert(target_path);
        } else {
            imported_names
                .entry(target_path)
                .or_default()
                .extend(edge.symbols.iter().cloned());
        }
    }

    // Instantiation edges target the constructor method, so a class whose
    // declared ctor is called counts as called itself.
    let mut instantiated: HashSet<(String, String)> = HashSet::new();
    for node in graph.nodes_by_kind(NodeKind::Method) {
        if node.is_ctor && graph.has_incoming(&node.id, EdgeType::Calls) {
            instantiated.insert((node.file_path.clone(), node.class_name.clone()));
        }
    }

    // Passes 1 + 2: candidates minus exemptions.
    let mut dead: HashSet<String> = HashSet::new();
    for kind in DEAD_CODE_KINDS {
        for node in graph.nodes_by_kind(kind) {
            if graph.has_incoming(&node.id, EdgeType::Calls) {
                continue;
            }
            if node.kind == NodeKind::Class
                && instantiated.contains(&(node.file_path.clone(), node.name.clone()))
            {
                continue;
            }
            if module_imported.contains(&node.file_path) {
                continue;
            }
            let simple_name = simple_name(&node.name);
            if imported_names
                .get(&node.file_path)
                .is_some_and(|names| names.contains(simple_name) || names.contains(&node.name))
            {
                continue;
            }
            if is_exempt(node) {
                continue;
            }
            dead.insert(node.id.clone());
        }
    }

    // Pass 3: overrides of live ancestor methods.
    let revived = override_pass(graph, &dead);
    for id in revived {
        dead.remove(&id);
    }

    // Pass 4: interface conformance.
    let revived = conformance_pass(graph, &dead);
    for id in revived {
        dead.remove(&id);
    }

    // Pass 5: interface stubs are contracts, never dead.
    let stub_ids: Vec<String> = dead
        .iter()
        .filter(|id| {
            graph
                .get_node(id)
                .map(|n| n.is_stub)
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    for id in stub_ids {
        dead.remove(&id);
    }

    for id in &dead {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_dead = true;
            debug!("dead symbol: {id}");
        }
    }
    dead.len()
}

/// Pass 2 exemption rules.
fn is_exempt(node: &crate::graph::GraphNode) -> bool {
    if node.is_entry_point || node.is_exported || node.is_ctor || node.is_property || node.is_test
    {
        return true;
    }
    let name = simple_name(&node.name);
    if is_dunder(name) {
        return true;
    }
    if node.file_path.ends_with("__init__.py") {
        return true;
    }
    if is_test_file(&node.file_path) {
        return true;
    }
    if !node.decorators.is_empty() {
        return true;
    }
    false
}

fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn is_dunder(name: &str) -> bool {
    name.starts_with("__") && name.ends_with("__") && name.len() > 4
}

/// Test files by path convention: a `test` path segment, a `test_` name
/// prefix, or a test/spec suffix before the extension.
fn is_test_file(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if file_name.starts_with("test_") {
        return true;
    }
    let stem = file_name.split('.').next().unwrap_or(file_name);
    if stem.ends_with("_test") || file_name.contains(".test.") || file_name.contains(".spec.") {
        return true;
    }
    path.split('/').any(|seg| seg == "tests" || seg == "test")
}

/// Pass 3: methods overriding a non-dead ancestor method (name + arity),
/// ancestors walked breadth-first over EXTENDS.
fn override_pass(graph: &KnowledgeGraph, dead: &HashSet<String>) -> Vec<String> {
    // class name -> class ids (classes can repeat across files).
    let mut classes_by_name: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in graph.nodes_by_kind(NodeKind::Class) {
        classes_by_name
            .entry(node.name.as_str())
            .or_default()
            .push(node.id.as_str());
    }

    // (class name, method simple name) -> method nodes.
    let mut methods_by_class: HashMap<(String, String), Vec<&crate::graph::GraphNode>> =
        HashMap::new();
    for node in graph.nodes_by_kind(NodeKind::Method) {
        methods_by_class
            .entry((node.class_name.clone(), simple_name(&node.name).to_string()))
            .or_default()
            .push(node);
    }

    let mut revived = Vec::new();
    for id in dead {
        let Some(method) = graph.get_node(id) else {
            continue;
        };
        if method.kind != NodeKind::Method || method.class_name.is_empty() {
            continue;
        }

        let Some(class_ids) = classes_by_name.get(method.class_name.as_str()) else {
            continue;
        };
        // Prefer the class in the method's own file.
        let class_id = class_ids
            .iter()
            .find(|cid| {
                graph
                    .get_node(cid)
                    .is_some_and(|c| c.file_path == method.file_path)
            })
            .or_else(|| class_ids.first());
        let Some(&class_id) = class_id else { continue };

        if overrides_live_ancestor(graph, class_id, method, dead, &methods_by_class) {
            revived.push(id.clone());
        }
    }
    revived
}

fn overrides_live_ancestor(
    graph: &KnowledgeGraph,
    class_id: &str,
    method: &crate::graph::GraphNode,
    dead: &HashSet<String>,
    methods_by_class: &HashMap<(String, String), Vec<&crate::graph::GraphNode>>,
) -> bool {
    let method_name = simple_name(&method.name).to_string();

    let mut visited: HashSet<String> = HashSet::from([class_id.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([class_id.to_string()]);

    while let Some(current) = queue.pop_front() {
        for edge in graph.outgoing(&current, Some(EdgeType::Extends)) {
            if !visited.insert(edge.target.clone()) {
                continue;
            }
            let Some(ancestor) = graph.get_node(&edge.target) else {
                continue;
            };
            if let Some(candidates) =
                methods_by_class.get(&(ancestor.name.clone(), method_name.clone()))
            {
                for candidate in candidates {
                    if candidate.arity == method.arity && !dead.contains(&candidate.id) {
                        return true;
                    }
                }
            }
            queue.push_back(edge.target.clone());
        }
    }
    false
}

/// Pass 4: methods whose class IMPLEMENTS an interface declaring the
/// method name.
fn conformance_pass(graph: &KnowledgeGraph, dead: &HashSet<String>) -> Vec<String> {
    // class name -> interface ids it implements.
    let mut implemented: HashMap<String, Vec<String>> = HashMap::new();
    for node in graph.nodes_by_kind(NodeKind::Class) {
        let interfaces: Vec<String> = graph
            .outgoing(&node.id, Some(EdgeType::Implements))
            .into_iter()
            .map(|e| e.target.clone())
            .collect();
        if !interfaces.is_empty() {
            implemented.entry(node.name.clone()).or_default().extend(interfaces);
        }
    }

    let mut revived = Vec::new();
    for id in dead {
        let Some(method) = graph.get_node(id) else {
            continue;
        };
        if method.kind != NodeKind::Method || method.class_name.is_empty() {
            continue;
        }
        let Some(interface_ids) = implemented.get(&method.class_name) else {
            continue;
        };
        let method_name = simple_name(&method.name);
        let conforms = interface_ids.iter().any(|interface_id| {
            graph
                .get_node(interface_id)
                .is_some_and(|i| i.methods_declared.iter().any(|m| m == method_name))
        });
        if conforms {
            revived.push(id.clone());
        }
    }
    revived
}
