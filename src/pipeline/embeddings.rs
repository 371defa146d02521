//! Phase 12: embedding generation.
//!
//! Calls an external encoder once per symbol with
//! `name + signature + body snippet` as input and stores the returned
//! 384-dim vector on the node. The encoder is an opaque collaborator; a
//! per-item failure simply leaves that node vector-less. The whole phase
//! is skippable by configuration.

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::graph::KnowledgeGraph;
use crate::storage::EMBEDDING_DIM;

/// Batch size per encoder call.
const BATCH_SIZE: usize = 64;

/// Encoder contract: text in, 384-dim vectors out. Items may fail
/// individually (`None`).
pub trait Encoder {
    fn encode(&self, batch: &[String]) -> Result<Vec<Option<Vec<f32>>>>;
}

/// Encode every symbol node. Returns the number of vectors stored.
pub fn process_embeddings(
    graph: &mut KnowledgeGraph,
    config: &AnalysisConfig,
    encoder: &dyn Encoder,
) -> usize {
    if config.skip_embeddings {
        debug!("embedding phase skipped by configuration");
        return 0;
    }

    // Symbol ids are already in deterministic order.
    let ids = graph.symbol_ids();
    let inputs: Vec<String> = ids
        .iter()
        .map(|id| {
            let node = graph.get_node(id).expect("symbol id from the graph");
            format!("{} {} {}", node.name, node.signature, node.body)
        })
        .collect();

    let mut stored = 0;
    for (chunk_ids, chunk_inputs) in ids.chunks(BATCH_SIZE).zip(inputs.chunks(BATCH_SIZE)) {
        let vectors = match encoder.encode(chunk_inputs) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("encoder batch failed, {} symbols skipped: {e}", chunk_ids.len());
                continue;
            }
        };
        for (id, vector) in chunk_ids.iter().zip(vectors) {
            let Some(vector) = vector else { continue };
            if vector.len() != EMBEDDING_DIM {
                warn!(
                    "encoder returned {}-dim vector for {id}, expected {EMBEDDING_DIM}",
                    vector.len()
                );
                continue;
            }
            if let Some(node) = graph.get_node_mut(id) {
                node.embedding = Some(vector);
                stored += 1;
            }
        }
    }

    stored
}
