//! Node catalog: the single owner of node content
//!
//! The catalog registers embeddings with the vector index on behalf of its
//! callers, and joins them back when nodes are read. Indexes only ever hold
//! node identifiers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{Metadata, Node, NodeId, NodeRecord},
};

pub mod memory;

pub use memory::InMemoryCatalog;

/// Input for [`NodeCatalog::create`]
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Option<Vec<f64>>,
    /// Caller-chosen identifier; a fresh `node-{n}` is assigned when absent
    pub id: Option<NodeId>,
}

impl NewNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f64>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Core trait for node storage
#[async_trait]
pub trait NodeCatalog: Send + Sync {
    /// Store a node, registering its embedding if one is present
    async fn create(&self, node: NewNode) -> Result<NodeId>;

    /// Get a node joined with its embedding
    async fn get(&self, id: &NodeId) -> Result<Node>;

    /// Text of each known node among `ids`; unknown ids are skipped
    async fn texts(&self, ids: &[NodeId]) -> HashMap<NodeId, Arc<str>>;

    /// Nodes in creation order
    async fn list(&self, limit: usize, offset: usize) -> Vec<Node>;

    /// Remove a node and its embedding
    async fn delete(&self, id: &NodeId) -> Result<NodeRecord>;

    /// Merge `metadata` into the node's metadata, overwriting existing keys
    async fn merge_metadata(&self, id: &NodeId, metadata: Metadata) -> Result<Node>;

    /// Identifier and text of every node, in creation order
    async fn entries(&self) -> Vec<(NodeId, Arc<str>)>;

    /// Whether a node with `id` exists
    async fn contains(&self, id: &NodeId) -> bool;

    /// Number of nodes
    async fn len(&self) -> usize;

    /// Load previously persisted records without writing them back
    async fn restore(&self, records: Vec<NodeRecord>) -> Result<()>;
}
