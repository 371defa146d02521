//! Phase 9: process (execution flow) detection.
//!
//! Detects framework-aware entry points, traces BFS flows over CALLS
//! edges (depth-bounded, cycle-aware, branching capped toward higher
//! confidence), deduplicates near-identical flows, and records each kept
//! flow as a Process node with STEP_IN_PROCESS edges whose `step_number`
//! is the BFS distance from the entry point.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::config::AnalysisConfig;
use crate::graph::{
    synthetic_id, EdgeType, GraphEdge, GraphNode, KnowledgeGraph, NodeKind,
};

/// Detect flows and create Process nodes.
///
/// # Returns
/// The number of Process nodes created.
pub fn process_flows(graph: &mut KnowledgeGraph, config: &AnalysisConfig) -> usize {
    let entry_ids = find_entry_points(graph);
    debug!("found {} entry points", entry_ids.len());

    for id in &entry_ids {
        if let Some(node) = graph.get_node_mut(id) {
            node.is_entry_point = true;
        }
    }

    // Trace one flow per entry point. Each step carries its BFS distance.
    let flows: Vec<Vec<(String, u32)>> = entry_ids
        .iter()
        .map(|entry| trace_flow(graph, entry, config))
        .collect();

    let flows = deduplicate_flows(flows);

    // Trivial single-step flows carry no information.
    let flows: Vec<_> = flows.into_iter().filter(|f| f.len() > 1).collect();

    let mut created = 0;
    for (ordinal, steps) in flows.iter().enumerate() {
        let process_id = synthetic_id(NodeKind::Process, &format!("process_{ordinal}"));
        let label = flow_label(graph, steps);
        let kind = flow_kind(graph, steps);

        let mut node = GraphNode::new(NodeKind::Process, process_id.clone(), label);
        node.entry_symbol_id = steps[0].0.clone();
        node.flow_kind = kind;
        graph.add_node(node);

        for (symbol_id, distance) in steps {
            let mut edge = GraphEdge::new(
                EdgeType::StepInProcess,
                symbol_id.clone(),
                process_id.clone(),
            );
            edge.step_number = Some(*distance);
            graph.add_edge(edge);
        }
        created += 1;
    }

    debug!("created {created} process nodes");
    created
}

/// Framework-aware entry point detection.
///
/// Returned ids are sorted (graph iteration order), so downstream Process
/// ordinals are deterministic.
fn find_entry_points(graph: &KnowledgeGraph) -> Vec<String> {
    let mut entries = Vec::new();
    for node in graph.nodes() {
        if !matches!(node.kind, NodeKind::Function | NodeKind::Method) {
            continue;
        }
        if is_entry_point(node, graph) {
            entries.push(node.id.clone());
        }
    }
    entries
}

fn is_entry_point(node: &crate::graph::GraphNode, graph: &KnowledgeGraph) -> bool {
    match node.language.as_str() {
        "python" => is_python_entry(node),
        "typescript" | "javascript" => is_ts_js_entry(node, graph),
        "csharp" => is_csharp_entry(node),
        _ => false,
    }
}

fn is_python_entry(node: &crate::graph::GraphNode) -> bool {
    for decorator in &node.decorators {
        if decorator.starts_with("app.route")
            || decorator == "click.command"
            || is_router_decorator(decorator)
        {
            return true;
        }
    }
    if node.name.starts_with("test_") {
        return true;
    }
    if node.name == "main" {
        return true;
    }
    // Module-level `__main__`-guarded scripts: script-shaped files whose
    // top-level functions are externally invoked.
    if node.kind == NodeKind::Function
        && (node.file_path.ends_with("__main__.py")
            || node.file_path.ends_with("cli.py")
            || node.file_path.ends_with("main.py")
            || node.file_path.ends_with("app.py"))
        && node.body.contains("__main__")
    {
        return true;
    }
    false
}

fn is_router_decorator(decorator: &str) -> bool {
    let Some(rest) = decorator.strip_prefix("router.") else {
        return false;
    };
    matches!(rest, "get" | "post" | "put" | "delete")
}

fn is_ts_js_entry(node: &crate::graph::GraphNode, graph: &KnowledgeGraph) -> bool {
    // Express-style handler signature: (req, res) or (req, res, next).
    if is_express_signature(&node.signature) {
        return true;
    }
    // Top-level exports named handler or middleware.
    if node.is_exported && matches!(node.name.as_str(), "handler" | "middleware") {
        return true;
    }
    // Exported functions nothing in-repo calls (default exports included):
    // their invocations come from outside the analyzed code.
    if node.is_exported
        && node.kind == NodeKind::Function
        && !graph.has_incoming(&node.id, EdgeType::Calls)
    {
        return true;
    }
    false
}

/// `(req, res)` / `(req, res, next)` parameter lists, names compared
/// exactly (annotations stripped).
fn is_express_signature(signature: &str) -> bool {
    let Some(open) = signature.find('(') else {
        return false;
    };
    let Some(close) = signature[open..].find(')') else {
        return false;
    };
    let params: Vec<&str> = signature[open + 1..open + close]
        .split(',')
        .map(|p| p.trim().split(':').next().unwrap_or("").trim())
        .collect();
    matches!(params.as_slice(), ["req", "res"] | ["req", "res", "next"])
}

fn is_csharp_entry(node: &crate::graph::GraphNode) -> bool {
    if node.name == "Main" || node.name.ends_with(".Main") {
        return true;
    }
    node.decorators.iter().any(|d| {
        matches!(
            d.as_str(),
            "HttpGet"
                | "HttpPost"
                | "HttpPut"
                | "HttpDelete"
                | "Route"
                | "ApiController"
                | "Fact"
                | "Test"
                | "TestMethod"
        )
    })
}

/// BFS from an entry point over CALLS edges.
///
/// Bounded by `max_flow_depth`, cycle-aware via a per-traversal visited
/// set. At each node at most `max_flow_branching` callees are followed,
/// preferring higher-confidence edges (target id breaks ties for
/// determinism). Steps carry their BFS distance.
fn trace_flow(
    graph: &KnowledgeGraph,
    entry: &str,
    config: &AnalysisConfig,
) -> Vec<(String, u32)> {
    let mut visited: HashSet<String> = HashSet::from([entry.to_string()]);
    let mut steps: Vec<(String, u32)> = vec![(entry.to_string(), 0)];
    let mut queue: VecDeque<(String, u32)> = VecDeque::from([(entry.to_string(), 0)]);

    while let Some((current, depth)) = queue.pop_front() {
        if depth as usize >= config.max_flow_depth {
            continue;
        }

        let mut outgoing = graph.outgoing(&current, Some(EdgeType::Calls));
        outgoing.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target.cmp(&b.target))
        });

        let mut followed = 0;
        for edge in outgoing {
            if followed >= config.max_flow_branching {
                break;
            }
            if visited.contains(&edge.target) {
                continue;
            }
            if graph.get_node(&edge.target).is_none() {
                continue;
            }
            visited.insert(edge.target.clone());
            steps.push((edge.target.clone(), depth + 1));
            queue.push_back((edge.target.clone(), depth + 1));
            followed += 1;
        }
    }

    steps
}

/// Drop flows sharing more than 70% of their nodes with a longer flow.
fn deduplicate_flows(flows: Vec<Vec<(String, u32)>>) -> Vec<Vec<(String, u32)>> {
    let mut indexed: Vec<Vec<(String, u32)>> = flows;
    indexed.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut kept: Vec<Vec<(String, u32)>> = Vec::new();
    let mut kept_sets: Vec<HashSet<String>> = Vec::new();

    for flow in indexed {
        let flow_ids: HashSet<String> = flow.iter().map(|(id, _)| id.clone()).collect();
        let is_duplicate = kept_sets.iter().any(|kept_set| {
            if flow_ids.is_empty() || kept_set.is_empty() {
                return false;
            }
            let intersection = flow_ids.intersection(kept_set).count();
            let smaller = flow_ids.len().min(kept_set.len());
            intersection as f64 / smaller as f64 > 0.7
        });
        if !is_duplicate {
            kept_sets.push(flow_ids);
            kept.push(flow);
        }
    }

    // Stable order for Process ordinals: by entry symbol id.
    kept.sort_by(|a, b| a[0].0.cmp(&b[0].0));
    kept
}

/// `"entry → step2 → step3"` with at most 4 names.
fn flow_label(graph: &KnowledgeGraph, steps: &[(String, u32)]) -> String {
    let names: Vec<String> = steps
        .iter()
        .take(4)
        .filter_map(|(id, _)| graph.get_node(id).map(|n| n.name.clone()))
        .collect();
    names.join(" \u{2192} ")
}

/// `intra_community` when every step shares one community,
/// `cross_community` when they span several, `unknown` without any
/// membership data.
fn flow_kind(graph: &KnowledgeGraph, steps: &[(String, u32)]) -> String {
    let mut communities: HashSet<&str> = HashSet::new();
    let mut has_any = false;
    for (id, _) in steps {
        for edge in graph.outgoing(id, Some(EdgeType::MemberOf)) {
            has_any = true;
            communities.insert(edge.target.as_str());
        }
    }
    if !has_any {
        "unknown".to_string()
    } else if communities.len() <= 1 {
        "intra_community".to_string()
    } else {
        "cross_community".to_string()
    }
}

/// Step numbers of a process, keyed by symbol id. Test support for
/// invariant checks.
pub fn steps_of(graph: &KnowledgeGraph, process_id: &str) -> HashMap<String, u32> {
    graph
        .incoming(process_id, Some(EdgeType::StepInProcess))
        .into_iter()
        .filter_map(|e| e.step_number.map(|n| (e.source.clone(), n)))
        .collect()
}
