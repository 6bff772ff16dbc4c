//! Result models for the hybrid retrieval engine
//!
//! Durations serialize as fractional milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    graph::Neighbor,
    hybrid::query::QueryMode,
    types::{Edge, NodeId},
};

/// A ranked node with the partial scores that produced its rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub node_id: NodeId,
    pub text: String,
    /// Raw cosine similarity; absent when the node was not a vector candidate
    pub vector_score: Option<f64>,
    /// Lexical and connectivity relevance; absent when not a graph candidate
    pub graph_score: Option<f64>,
    pub hybrid_score: f64,
    /// Present only when the reranking pass ran
    pub rerank_score: Option<f64>,
    /// Edges touching this node, bounded
    pub relationships: Vec<Edge>,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

impl RetrievalResult {
    /// The score this result was ranked by
    pub fn ranking_score(&self) -> f64 {
        self.rerank_score.unwrap_or(self.hybrid_score)
    }
}

/// Response of local and hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub results: Vec<RetrievalResult>,
    /// Edges touching any returned node, bounded
    pub relationships: Vec<Edge>,
    /// Candidates considered before truncation to `top_k`
    pub total_candidates: usize,
    /// Mean ranking score of the returned results
    pub confidence: f64,
    /// Name of the fusion strategy, when one ran
    pub strategy: Option<String>,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

/// Response of global (graph-only) retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalResponse {
    pub entities: Vec<RetrievalResult>,
    /// Edges touching the reachable set, bounded
    pub relationships: Vec<Edge>,
    pub total_candidates: usize,
    pub confidence: f64,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

/// Response of the mode-dispatching `query` entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryResponse {
    Local(RetrievalResponse),
    Global(GlobalResponse),
    Hybrid(RetrievalResponse),
}

impl QueryResponse {
    pub fn mode(&self) -> QueryMode {
        match self {
            QueryResponse::Local(_) => QueryMode::Local,
            QueryResponse::Global(_) => QueryMode::Global,
            QueryResponse::Hybrid(_) => QueryMode::Hybrid,
        }
    }

    /// Ranked results regardless of mode
    pub fn results(&self) -> &[RetrievalResult] {
        match self {
            QueryResponse::Local(r) | QueryResponse::Hybrid(r) => &r.results,
            QueryResponse::Global(g) => &g.entities,
        }
    }

    pub fn relationships(&self) -> &[Edge] {
        match self {
            QueryResponse::Local(r) | QueryResponse::Hybrid(r) => &r.relationships,
            QueryResponse::Global(g) => &g.relationships,
        }
    }
}

/// A node reached by traversal, joined with its text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalEntry {
    pub node_id: NodeId,
    pub text: String,
    pub depth: usize,
    pub edges: Vec<Edge>,
}

impl TraversalEntry {
    pub fn new(node_id: NodeId, text: String, neighbor: Neighbor) -> Self {
        Self {
            node_id,
            text,
            depth: neighbor.depth,
            edges: neighbor.edges,
        }
    }
}

/// Everything reachable from `start`, ordered by depth then identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalResponse {
    pub start: NodeId,
    pub depth: usize,
    pub nodes: Vec<TraversalEntry>,
}

/// Result of a cascading node deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedNode {
    pub node_id: NodeId,
    pub edges_removed: usize,
}

/// Running query counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    pub total_queries: u64,
    pub local_queries: u64,
    pub global_queries: u64,
    pub hybrid_queries: u64,
    pub avg_latency_ms: f64,
}

impl QueryStats {
    /// Fold one completed query into the counters
    pub fn record(&mut self, mode: QueryMode, latency: Duration) {
        match mode {
            QueryMode::Local => self.local_queries += 1,
            QueryMode::Global => self.global_queries += 1,
            QueryMode::Hybrid => self.hybrid_queries += 1,
        }
        self.total_queries += 1;

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let n = self.total_queries as f64;
        self.avg_latency_ms += (latency_ms - self.avg_latency_ms) / n;
    }
}

/// Engine-wide statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub vector_dimension: usize,
    /// Nodes that carry an embedding
    pub indexed_vectors: usize,
    pub queries: QueryStats,
}

/// Mean of the ranking scores, zero for an empty list
pub(crate) fn confidence(results: &[RetrievalResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(RetrievalResult::ranking_score).sum::<f64>() / results.len() as f64
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom("latency must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(ms / 1000.0))
    }
}
