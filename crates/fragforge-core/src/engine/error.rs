use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::graph::GraphError;
use crate::core::models::vertex::MutationType;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Graph operation failed: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Vertex {vertex_id} is not part of graph {graph_id}")]
    VertexNotInGraph { vertex_id: u64, graph_id: u64 },

    #[error("Attachment point {index} does not exist on vertex {vertex_id}")]
    ApOutOfRange { vertex_id: u64, index: usize },

    #[error("Mutation {mutation} on vertex {vertex_id} requires a parent edge")]
    MissingParentEdge {
        mutation: MutationType,
        vertex_id: u64,
    },

    #[error("Attachment point {index} of vertex {vertex_id} is not the source of an edge")]
    NotASourceAp { vertex_id: u64, index: usize },

    #[error(
        "Fragment {building_block} AP {ap_index} cannot attach to AP {index} of vertex {vertex_id}"
    )]
    IncompatibleChoice {
        vertex_id: u64,
        index: usize,
        building_block: usize,
        ap_index: usize,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Corrupted graph after {operation}: {reason}\n{graph}")]
    CorruptedGraph {
        operation: &'static str,
        reason: String,
        graph: String,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
