//! Hybrid Vector + Graph retrieval
//!
//! This module fuses dense-vector similarity with graph relevance over one
//! shared corpus. [`HybridStore`] is the facade external callers go through.

use async_trait::async_trait;

use crate::{
    catalog::NewNode,
    error::Result,
    graph::NewEdge,
    types::{Edge, EdgeId, Metadata, Node, NodeId},
};

pub mod fusion;
pub mod models;
pub mod query;
pub mod rerank;
pub mod scoring;
pub mod store;

pub use fusion::{FusionStrategy, ReciprocalRankFusion, WeightedFusion};
pub use models::{
    DeletedNode, EngineStats, GlobalResponse, QueryResponse, QueryStats, RetrievalResponse,
    RetrievalResult, TraversalEntry, TraversalResponse,
};
pub use query::{QueryMode, QueryParam, QueryParamBuilder};
pub use scoring::{GraphScorer, LexicalScorer};
pub use store::HybridStore;

/// Operations the engine exposes to its callers
#[async_trait]
pub trait HybridRetrieval: Send + Sync {
    /// Create a node; returns its identifier
    async fn create_node(&self, node: NewNode) -> Result<NodeId>;

    /// Create an edge between two existing nodes
    async fn create_edge(&self, edge: NewEdge) -> Result<Edge>;

    /// Get a node by ID
    async fn get_node(&self, id: &NodeId) -> Result<Node>;

    /// Nodes in creation order
    async fn list_nodes(&self, limit: usize, offset: usize) -> Result<Vec<Node>>;

    /// Delete a node together with its embedding and every edge touching it
    async fn delete_node(&self, id: &NodeId) -> Result<DeletedNode>;

    /// Attach or replace the embedding of an existing node
    async fn set_embedding(&self, id: &NodeId, embedding: Vec<f64>) -> Result<()>;

    /// Merge metadata into an existing node
    async fn enrich_node(&self, id: &NodeId, metadata: Metadata) -> Result<Node>;

    /// Get an edge by ID
    async fn get_edge(&self, id: &EdgeId) -> Result<Edge>;

    /// Remove a single edge
    async fn remove_edge(&self, id: &EdgeId) -> Result<Edge>;

    /// Edges in creation order
    async fn list_edges(&self, limit: usize, offset: usize) -> Result<Vec<Edge>>;

    /// Nodes reachable from `start` along outgoing edges
    async fn traverse(&self, start: &NodeId, depth: usize) -> Result<TraversalResponse>;

    /// Vector-only retrieval
    async fn local_search(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f64>>,
        top_k: usize,
    ) -> Result<RetrievalResponse>;

    /// Graph-only retrieval returning `Config::default_top_k` entities
    async fn global_search(&self, query_text: &str, depth: usize) -> Result<GlobalResponse>;

    /// Graph-only retrieval with an explicit result count
    async fn global_search_top_k(
        &self,
        query_text: &str,
        depth: usize,
        top_k: usize,
    ) -> Result<GlobalResponse>;

    /// Weighted fusion of vector and graph retrieval
    async fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f64>>,
        top_k: usize,
        vector_weight: f64,
        graph_weight: f64,
        do_rerank: bool,
    ) -> Result<RetrievalResponse>;

    /// Hybrid retrieval with a caller-chosen fusion strategy
    async fn fuse_with(
        &self,
        param: QueryParam,
        strategy: &dyn FusionStrategy,
    ) -> Result<RetrievalResponse>;

    /// Run `param` in the mode it names
    async fn query(&self, param: QueryParam) -> Result<QueryResponse>;

    /// Corpus and query statistics
    async fn stats(&self) -> Result<EngineStats>;
}
