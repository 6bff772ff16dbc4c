use serde::{Deserialize, Serialize};

use crate::types::{Metadata, NodeId};

/// Request to create a new node
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodeRequest {
    /// Node text
    pub text: String,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// Precomputed embedding
    pub embedding: Option<Vec<f64>>,
    /// Caller-chosen identifier
    pub id: Option<NodeId>,
}

/// Response to a node creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeResponse {
    pub node_id: NodeId,
}

/// Request to create a new edge
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEdgeRequest {
    pub source: NodeId,
    pub target: NodeId,
    pub relationship_type: String,
    /// Defaults to 1.0
    pub weight: Option<f64>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Request to attach an embedding to an existing node
#[derive(Debug, Clone, Deserialize)]
pub struct SetEmbeddingRequest {
    pub embedding: Vec<f64>,
}

/// Pagination for list endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Hop limit for traversal
#[derive(Debug, Clone, Deserialize)]
pub struct TraverseParams {
    pub depth: Option<usize>,
}

/// Vector-only retrieval request
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSearchRequest {
    pub query: String,
    pub query_embedding: Option<Vec<f64>>,
    pub top_k: Option<usize>,
}

/// Graph-only retrieval request
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSearchRequest {
    pub query: String,
    pub depth: Option<usize>,
    pub top_k: Option<usize>,
}

/// Fused retrieval request
#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    pub query_embedding: Option<Vec<f64>>,
    pub top_k: Option<usize>,
    pub vector_weight: Option<f64>,
    pub graph_weight: Option<f64>,
    #[serde(default)]
    pub rerank: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    /// Seconds since startup
    pub uptime: u64,
}
