//! Phase 8: community detection.
//!
//! Runs Leiden-style modularity optimization (local moving until stable,
//! then a refinement pass that splits internally disconnected clusters)
//! over the undirected subgraph induced by symbol nodes and the union of
//! CALLS, USES_TYPE, EXTENDS, IMPLEMENTS edges, unweighted.
//!
//! Node iteration order is fixed (sorted ids), so cluster assignment is
//! deterministic for a given graph.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::{
    synthetic_id, EdgeType, GraphEdge, GraphNode, KnowledgeGraph, NodeKind,
};

/// Edge types that induce the community subgraph.
const COMMUNITY_EDGES: [EdgeType; 4] = [
    EdgeType::Calls,
    EdgeType::UsesType,
    EdgeType::Extends,
    EdgeType::Implements,
];

/// Detect communities and write Community nodes + MEMBER_OF edges.
///
/// # Returns
/// The number of Community nodes created (including the synthetic `misc`
/// community when singletons exist).
pub fn process_communities(graph: &mut KnowledgeGraph) -> usize {
    let subgraph = SymbolSubgraph::build(graph);
    if subgraph.ids.is_empty() {
        return 0;
    }

    let mut partition = local_moving(&subgraph);
    refine(&subgraph, &mut partition);

    // Gather clusters: community representative -> member node indexes.
    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &community) in partition.iter().enumerate() {
        clusters.entry(community).or_default().push(node);
    }

    // Deterministic cluster order: by smallest member id.
    let mut ordered: Vec<Vec<usize>> = clusters.into_values().collect();
    ordered.sort_by(|a, b| subgraph.ids[a[0]].cmp(&subgraph.ids[b[0]]));

    let mut community_count = 0;
    let mut misc_members: Vec<usize> = Vec::new();
    let mut member_edges: Vec<(String, String)> = Vec::new();

    for members in ordered {
        if members.len() == 1 {
            misc_members.push(members[0]);
            continue;
        }

        let label = cluster_label(&subgraph, &members);
        let cohesion = cluster_cohesion(&subgraph, &members, &partition);
        let community_id = synthetic_id(
            NodeKind::Community,
            &format!("community_{community_count}"),
        );

        let mut node = GraphNode::new(NodeKind::Community, community_id.clone(), label);
        node.cohesion = cohesion;
        graph.add_node(node);

        for &member in &members {
            member_edges.push((subgraph.ids[member].clone(), community_id.clone()));
        }
        community_count += 1;
    }

    // Singletons share one synthetic "misc" community.
    if !misc_members.is_empty() {
        let misc_id = synthetic_id(NodeKind::Community, "community_misc");
        let node = GraphNode::new(NodeKind::Community, misc_id.clone(), "misc");
        graph.add_node(node);
        for member in misc_members {
            member_edges.push((subgraph.ids[member].clone(), misc_id.clone()));
        }
        community_count += 1;
    }

    for (symbol, community) in member_edges {
        graph.add_edge(GraphEdge::new(EdgeType::MemberOf, symbol, community));
    }

    community_count
}

/// Undirected, unweighted, deduplicated symbol subgraph.
struct SymbolSubgraph {
    /// Sorted symbol ids; index = dense node handle.
    ids: Vec<String>,
    /// Repo-relative path per node, for labels.
    paths: Vec<String>,
    adjacency: Vec<Vec<usize>>,
    /// Total undirected edge count (m).
    edge_count: usize,
}

impl SymbolSubgraph {
    fn build(graph: &KnowledgeGraph) -> Self {
        let ids = graph.symbol_ids();
        let index: HashMap<&String, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let paths = ids
            .iter()
            .map(|id| {
                graph
                    .get_node(id)
                    .map(|n| n.file_path.clone())
                    .unwrap_or_default()
            })
            .collect();

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut adjacency = vec![Vec::new(); ids.len()];
        let mut edge_count = 0;

        for edge in graph.edges() {
            if !COMMUNITY_EDGES.contains(&edge.edge_type) {
                continue;
            }
            let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) else {
                continue;
            };
            if a == b {
                continue;
            }
            let key = (a.min(b), a.max(b));
            if !seen.insert(key) {
                continue;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
            edge_count += 1;
        }

        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }

        Self {
            ids,
            paths,
            adjacency,
            edge_count,
        }
    }

    fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }
}

/// Local moving: repeatedly move nodes to the neighboring community with
/// the highest positive modularity gain until a full pass makes no move.
fn local_moving(subgraph: &SymbolSubgraph) -> Vec<usize> {
    let n = subgraph.ids.len();
    let mut partition: Vec<usize> = (0..n).collect();
    if subgraph.edge_count == 0 {
        return partition;
    }

    let two_m = (2 * subgraph.edge_count) as f64;
    // Sum of degrees per community.
    let mut community_degree: Vec<f64> = (0..n).map(|i| subgraph.degree(i) as f64).collect();

    let mut moved = true;
    let mut rounds = 0;
    while moved && rounds < 32 {
        moved = false;
        rounds += 1;

        for node in 0..n {
            let degree = subgraph.degree(node) as f64;
            if degree == 0.0 {
                continue;
            }
            let current = partition[node];

            // Links from `node` into each neighboring community.
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for &neighbor in &subgraph.adjacency[node] {
                *links.entry(partition[neighbor]).or_default() += 1.0;
            }

            community_degree[current] -= degree;
            let links_to_current = links.get(&current).copied().unwrap_or(0.0);

            let mut best_community = current;
            let mut best_gain = links_to_current - degree * community_degree[current] / two_m;

            for (&community, &link_count) in &links {
                if community == current {
                    continue;
                }
                let gain = link_count - degree * community_degree[community] / two_m;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best_community = community;
                }
            }

            community_degree[best_community] += degree;
            if best_community != current {
                partition[node] = best_community;
                moved = true;
            }
        }
    }

    partition
}

/// Refinement: a community must be internally connected. Split any
/// cluster that is not into its connected components.
fn refine(subgraph: &SymbolSubgraph, partition: &mut [usize]) {
    let n = subgraph.ids.len();
    let mut next_label = n;
    let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &community) in partition.iter().enumerate() {
        clusters.entry(community).or_default().push(node);
    }

    for (community, members) in clusters {
        let member_set: HashSet<usize> = members.iter().copied().collect();
        let mut unvisited: std::collections::BTreeSet<usize> = members.iter().copied().collect();
        let mut first_component = true;

        while let Some(&start) = unvisited.iter().next() {
            // BFS within the cluster.
            let mut component = vec![start];
            let mut queue = std::collections::VecDeque::from([start]);
            unvisited.remove(&start);
            while let Some(current) = queue.pop_front() {
                for &neighbor in &subgraph.adjacency[current] {
                    if member_set.contains(&neighbor) && unvisited.remove(&neighbor) {
                        component.push(neighbor);
                        queue.push_back(neighbor);
                    }
                }
            }

            if first_component {
                first_component = false;
                // Keep the original label for the first component.
                for node in component {
                    partition[node] = community;
                }
            } else {
                for node in component {
                    partition[node] = next_label;
                }
                next_label += 1;
            }
        }
    }
}

/// Cohesion = internal-edge-count / (internal + boundary) edge count.
fn cluster_cohesion(
    subgraph: &SymbolSubgraph,
    members: &[usize],
    partition: &[usize],
) -> f64 {
    let community = partition[members[0]];
    let mut internal_twice = 0usize;
    let mut boundary = 0usize;

    for &member in members {
        for &neighbor in &subgraph.adjacency[member] {
            if partition[neighbor] == community {
                internal_twice += 1;
            } else {
                boundary += 1;
            }
        }
    }

    let internal = internal_twice / 2;
    let total = internal + boundary;
    if total == 0 {
        0.0
    } else {
        internal as f64 / total as f64
    }
}

/// Label = the most frequent two-segment path prefix among members,
/// tie-broken toward the prefix covering more members, then
/// lexicographically.
fn cluster_label(subgraph: &SymbolSubgraph, members: &[usize]) -> String {
    let mut prefix_counts: BTreeMap<String, usize> = BTreeMap::new();
    for &member in members {
        let prefix = path_prefix(&subgraph.paths[member]);
        *prefix_counts.entry(prefix).or_default() += 1;
    }
    prefix_counts
        .into_iter()
        // BTreeMap iterates keys ascending; max_by_key keeps the last
        // maximum, so ties resolve to the lexicographically larger key.
        // Reverse the key comparison to prefer the smaller one.
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(prefix, _)| prefix)
        .unwrap_or_else(|| "misc".to_string())
}

/// First two path segments joined with `/` (`src/models/user.py` →
/// `src/models`; a bare filename is its own prefix).
fn path_prefix(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() <= 1 {
        return path.to_string();
    }
    segments[..2.min(segments.len() - 1).max(1)].join("/")
}
