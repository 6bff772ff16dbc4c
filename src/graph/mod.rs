//! Directed multigraph of typed, weighted edges
//!
//! The graph store owns edge lifetime and refers to nodes by identifier only.
//! Whether an endpoint exists is decided by the caller before an edge is added.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    types::{Edge, EdgeId, Metadata, NodeId},
};

pub mod memory;

pub use memory::InMemoryGraph;

/// Weight given to edges created without one
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

/// Input for [`GraphStore::add_edge`]
#[derive(Debug, Clone)]
pub struct NewEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub relationship_type: String,
    pub weight: f64,
    pub metadata: Metadata,
}

impl NewEdge {
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship_type: relationship_type.into(),
            weight: DEFAULT_EDGE_WEIGHT,
            metadata: Metadata::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A node reached by traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Edges that led to this node from the previous layer
    pub edges: Vec<Edge>,
    /// Hop count at which the node was first reached
    pub depth: usize,
}

/// Core trait for edge storage and traversal
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Append an edge; parallel edges are never merged
    async fn add_edge(&self, edge: NewEdge) -> Result<Edge>;

    /// Get an edge by ID
    async fn get_edge(&self, id: &EdgeId) -> Result<Edge>;

    /// Remove a single edge
    async fn remove_edge(&self, id: &EdgeId) -> Result<Edge>;

    /// Remove every edge where `node` is the source or the target
    async fn remove_edges_for(&self, node: &NodeId) -> Result<Vec<Edge>>;

    /// Breadth-first traversal along outgoing edges, up to `depth` hops
    async fn neighbors(&self, node: &NodeId, depth: usize) -> HashMap<NodeId, Neighbor>;

    /// Number of edges where `node` is the source or the target
    async fn degree(&self, node: &NodeId) -> usize;

    /// [`GraphStore::degree`] for many nodes under a single read
    async fn degrees(&self, nodes: &[NodeId]) -> HashMap<NodeId, usize>;

    /// Edges touching any node in `nodes`, in creation order, at most `limit`
    async fn edges_touching(&self, nodes: &HashSet<NodeId>, limit: Option<usize>) -> Vec<Edge>;

    /// Edges in creation order
    async fn list_edges(&self, limit: usize, offset: usize) -> Vec<Edge>;

    /// Number of edges
    async fn edge_count(&self) -> usize;

    /// Load previously persisted edges without writing them back
    async fn restore(&self, edges: Vec<Edge>) -> Result<()>;
}
