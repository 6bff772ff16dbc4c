//! Hybrid Retrieval Engine
//!
//! Fuses dense-vector semantic search with graph-relationship traversal over a
//! shared node/edge corpus. Three retrieval modes are exposed: vector-only
//! (local), graph-only (global) and weighted fusion of both (hybrid).

pub mod api;
pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod hybrid;
pub mod persistence;
pub mod types;
pub mod vector;

pub use crate::{
    config::Config,
    error::{Error, Result},
};

pub use catalog::{NewNode, NodeCatalog};
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider};
pub use graph::{GraphStore, NewEdge};
pub use hybrid::{HybridRetrieval, HybridStore, QueryMode, QueryParam};
pub use persistence::{JsonLogPersistence, NoopPersistence, Persistence};
pub use types::{Edge, EdgeId, Metadata, Node, NodeId, Timestamp};
pub use vector::{cosine_similarity, VectorIndex};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
