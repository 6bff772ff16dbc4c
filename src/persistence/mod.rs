//! Persistence layer for nodes, embeddings and edges
//!
//! Components call into a [`Persistence`] implementation while they still hold
//! their write lock, so readers never observe state that was not handed to the
//! store first. Durability beyond that is the implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    types::{Edge, EdgeId, Metadata, NodeId, NodeRecord},
};

pub mod json_log;

pub use json_log::JsonLogPersistence;

/// State recovered from a persistence layer at startup, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<NodeRecord>,
    pub embeddings: Vec<(NodeId, Vec<f64>)>,
    pub edges: Vec<Edge>,
}

/// Write-through hooks for each mutation the engine performs
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Record a newly created node
    async fn put_node(&self, node: &NodeRecord) -> Result<()>;

    /// Record metadata merged into an existing node
    async fn merge_metadata(&self, id: &NodeId, metadata: &Metadata) -> Result<()>;

    /// Record a node removal
    async fn delete_node(&self, id: &NodeId) -> Result<()>;

    /// Record an inserted or replaced embedding
    async fn put_embedding(&self, id: &NodeId, embedding: &[f64]) -> Result<()>;

    /// Record an embedding removal
    async fn delete_embedding(&self, id: &NodeId) -> Result<()>;

    /// Record a newly created edge
    async fn put_edge(&self, edge: &Edge) -> Result<()>;

    /// Record an edge removal
    async fn delete_edge(&self, id: &EdgeId) -> Result<()>;

    /// Load everything previously recorded
    async fn load(&self) -> Result<Snapshot>;
}

/// Persistence that keeps nothing; the engine runs purely in memory
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {
    async fn put_node(&self, _node: &NodeRecord) -> Result<()> {
        Ok(())
    }

    async fn merge_metadata(&self, _id: &NodeId, _metadata: &Metadata) -> Result<()> {
        Ok(())
    }

    async fn delete_node(&self, _id: &NodeId) -> Result<()> {
        Ok(())
    }

    async fn put_embedding(&self, _id: &NodeId, _embedding: &[f64]) -> Result<()> {
        Ok(())
    }

    async fn delete_embedding(&self, _id: &NodeId) -> Result<()> {
        Ok(())
    }

    async fn put_edge(&self, _edge: &Edge) -> Result<()> {
        Ok(())
    }

    async fn delete_edge(&self, _id: &EdgeId) -> Result<()> {
        Ok(())
    }

    async fn load(&self) -> Result<Snapshot> {
        Ok(Snapshot::default())
    }
}
