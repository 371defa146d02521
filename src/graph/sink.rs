//! Single-writer sink for parallel producers.
//!
//! Parallel phases never mutate the graph directly: producers enqueue
//! node/edge records into a bounded channel and the driver thread drains
//! them into the graph. The writer is a queue, not a mutex-guarded map;
//! no two phases ever mutate concurrently.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use super::{GraphEdge, GraphNode, KnowledgeGraph};

/// One unit of graph mutation flowing through the sink.
#[derive(Debug)]
pub enum GraphRecord {
    Node(GraphNode),
    Edge(GraphEdge),
}

/// Producer half of the sink. Cloneable across rayon workers.
#[derive(Debug, Clone)]
pub struct GraphSink {
    tx: SyncSender<GraphRecord>,
}

impl GraphSink {
    pub fn node(&self, node: GraphNode) {
        // A send only fails when the drain side has gone away, which means
        // the run is already unwinding; the record is dropped with it.
        let _ = self.tx.send(GraphRecord::Node(node));
    }

    pub fn edge(&self, edge: GraphEdge) {
        let _ = self.tx.send(GraphRecord::Edge(edge));
    }
}

/// Create a bounded sink. The receiver must be drained concurrently with
/// production (see [`drain`]), otherwise producers block once the buffer
/// fills.
pub fn bounded(capacity: usize) -> (GraphSink, Receiver<GraphRecord>) {
    let (tx, rx) = sync_channel(capacity);
    (GraphSink { tx }, rx)
}

/// Drain every record into the graph until all sink clones are dropped.
///
/// # Returns
/// (nodes inserted, edges inserted), duplicates excluded.
pub fn drain(rx: Receiver<GraphRecord>, graph: &mut KnowledgeGraph) -> (usize, usize) {
    let mut nodes = 0;
    let mut edges = 0;
    for record in rx {
        match record {
            GraphRecord::Node(node) => {
                if graph.add_node(node) {
                    nodes += 1;
                }
            }
            GraphRecord::Edge(edge) => {
                if graph.add_edge(edge) {
                    edges += 1;
                }
            }
        }
    }
    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeType, NodeKind};

    #[test]
    fn test_records_arrive_in_graph() {
        let (sink, rx) = bounded(8);
        let mut graph = KnowledgeGraph::new();

        let producer = std::thread::spawn(move || {
            sink.node(GraphNode::new(NodeKind::File, "file:a.py", "a.py"));
            sink.node(GraphNode::new(NodeKind::Function, "function:a.py:f", "f"));
            sink.edge(GraphEdge::new(
                EdgeType::Defines,
                "file:a.py",
                "function:a.py:f",
            ));
        });

        let (nodes, edges) = drain(rx, &mut graph);
        producer.join().unwrap();

        assert_eq!(nodes, 2);
        assert_eq!(edges, 1);
        assert!(graph.contains_node("function:a.py:f"));
    }

    #[test]
    fn test_bounded_buffer_does_not_deadlock_with_concurrent_drain() {
        // Capacity far below the record count: producers must block and
        // resume as the drain side consumes.
        let (sink, rx) = bounded(2);
        let mut graph = KnowledgeGraph::new();

        let producer = std::thread::spawn(move || {
            for i in 0..100 {
                sink.node(GraphNode::new(
                    NodeKind::Function,
                    format!("function:a.py:f{i}"),
                    format!("f{i}"),
                ));
            }
        });

        let (nodes, _) = drain(rx, &mut graph);
        producer.join().unwrap();
        assert_eq!(nodes, 100);
    }

    #[test]
    fn test_duplicate_records_not_double_counted() {
        let (sink, rx) = bounded(8);
        let mut graph = KnowledgeGraph::new();

        let producer = std::thread::spawn(move || {
            for _ in 0..3 {
                sink.node(GraphNode::new(NodeKind::File, "file:a.py", "a.py"));
            }
        });

        let (nodes, _) = drain(rx, &mut graph);
        producer.join().unwrap();
        assert_eq!(nodes, 1);
    }
}
