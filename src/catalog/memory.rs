//! In-memory node catalog

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    catalog::{NewNode, NodeCatalog},
    error::{Error, Result},
    persistence::{NoopPersistence, Persistence},
    types::{Metadata, Node, NodeId, NodeRecord, Timestamp},
    vector::{validate_embedding, VectorIndex},
};

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<NodeId, (u64, NodeRecord)>,
    /// Creation sequence -> id
    order: BTreeMap<u64, NodeId>,
    next_order: u64,
}

impl State {
    fn insert(&mut self, record: NodeRecord) {
        if let Some((seq, _)) = self.nodes.remove(&record.id) {
            self.order.remove(&seq);
        }
        let seq = self.next_order;
        self.next_order += 1;
        self.order.insert(seq, record.id.clone());
        self.nodes.insert(record.id.clone(), (seq, record));
    }
}

/// Catalog backed by a hash map plus a creation-order index
pub struct InMemoryCatalog {
    state: RwLock<State>,
    next_id: AtomicU64,
    index: Arc<dyn VectorIndex>,
    persistence: Arc<dyn Persistence>,
}

impl InMemoryCatalog {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self::with_persistence(index, Arc::new(NoopPersistence))
    }

    pub fn with_persistence(index: Arc<dyn VectorIndex>, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            next_id: AtomicU64::new(0),
            index,
            persistence,
        }
    }

    /// Keep auto-assigned ids ahead of any `node-{n}` already in use
    fn reserve_past(&self, id: &NodeId) {
        if let Some(n) = id.sequence() {
            self.next_id.fetch_max(n.saturating_add(1), Ordering::SeqCst);
        }
    }

    async fn join(&self, record: NodeRecord) -> Node {
        let embedding = self.index.get(&record.id).await;
        Node::from_record(record, embedding)
    }
}

#[async_trait]
impl NodeCatalog for InMemoryCatalog {
    async fn create(&self, node: NewNode) -> Result<NodeId> {
        if let Some(embedding) = &node.embedding {
            validate_embedding(embedding, self.index.dimension())?;
        }

        let mut state = self.state.write().await;

        let id = match node.id {
            Some(id) => {
                if state.nodes.contains_key(&id) {
                    return Err(Error::DuplicateNode(id.to_string()));
                }
                self.reserve_past(&id);
                id
            }
            None => loop {
                let candidate = NodeId::from_sequence(self.next_id.fetch_add(1, Ordering::SeqCst));
                if !state.nodes.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let record = NodeRecord {
            id: id.clone(),
            text: node.text.into(),
            metadata: node.metadata,
            created_at: Timestamp::now(),
        };

        self.persistence.put_node(&record).await?;

        if let Some(embedding) = node.embedding {
            if let Err(err) = self.index.upsert(id.clone(), embedding).await {
                if let Err(undo) = self.persistence.delete_node(&id).await {
                    warn!(node_id = %id, error = %undo, "Failed to roll back persisted node");
                }
                return Err(err);
            }
        }

        state.insert(record);
        counter!("catalog_nodes_created_total").increment(1);
        gauge!("catalog_nodes").set(state.nodes.len() as f64);
        debug!(node_id = %id, "Created node");

        Ok(id)
    }

    async fn get(&self, id: &NodeId) -> Result<Node> {
        let record = {
            let state = self.state.read().await;
            state
                .nodes
                .get(id)
                .map(|(_, record)| record.clone())
                .ok_or_else(|| Error::NodeNotFound(id.to_string()))?
        };
        Ok(self.join(record).await)
    }

    async fn texts(&self, ids: &[NodeId]) -> HashMap<NodeId, Arc<str>> {
        let state = self.state.read().await;
        ids.iter()
            .filter_map(|id| {
                state
                    .nodes
                    .get(id)
                    .map(|(_, record)| (id.clone(), Arc::clone(&record.text)))
            })
            .collect()
    }

    async fn list(&self, limit: usize, offset: usize) -> Vec<Node> {
        let records: Vec<NodeRecord> = {
            let state = self.state.read().await;
            state
                .order
                .values()
                .skip(offset)
                .take(limit)
                .filter_map(|id| state.nodes.get(id).map(|(_, record)| record.clone()))
                .collect()
        };

        let mut nodes = Vec::with_capacity(records.len());
        for record in records {
            nodes.push(self.join(record).await);
        }
        nodes
    }

    async fn delete(&self, id: &NodeId) -> Result<NodeRecord> {
        let mut state = self.state.write().await;
        if !state.nodes.contains_key(id) {
            return Err(Error::NodeNotFound(id.to_string()));
        }

        self.index.remove(id).await?;
        self.persistence.delete_node(id).await?;

        let (seq, record) = state
            .nodes
            .remove(id)
            .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;
        state.order.remove(&seq);
        gauge!("catalog_nodes").set(state.nodes.len() as f64);
        info!(node_id = %id, "Deleted node");

        Ok(record)
    }

    async fn merge_metadata(&self, id: &NodeId, metadata: Metadata) -> Result<Node> {
        let record = {
            let mut state = self.state.write().await;
            let (_, record) = state
                .nodes
                .get_mut(id)
                .ok_or_else(|| Error::NodeNotFound(id.to_string()))?;

            self.persistence.merge_metadata(id, &metadata).await?;
            record.metadata.merge(metadata);
            record.clone()
        };
        Ok(self.join(record).await)
    }

    async fn entries(&self) -> Vec<(NodeId, Arc<str>)> {
        let state = self.state.read().await;
        state
            .order
            .values()
            .filter_map(|id| {
                state
                    .nodes
                    .get(id)
                    .map(|(_, record)| (id.clone(), Arc::clone(&record.text)))
            })
            .collect()
    }

    async fn contains(&self, id: &NodeId) -> bool {
        self.state.read().await.nodes.contains_key(id)
    }

    async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    async fn restore(&self, records: Vec<NodeRecord>) -> Result<()> {
        let mut state = self.state.write().await;
        for record in records {
            self.reserve_past(&record.id);
            state.insert(record);
        }
        gauge!("catalog_nodes").set(state.nodes.len() as f64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::FlatIndex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog(dimension: usize) -> (InMemoryCatalog, Arc<FlatIndex>) {
        let index = Arc::new(FlatIndex::new(dimension));
        (InMemoryCatalog::new(index.clone()), index)
    }

    #[tokio::test]
    async fn test_create_assigns_dense_ids() {
        let (catalog, _) = catalog(2);
        let a = catalog.create(NewNode::new("first")).await.unwrap();
        let b = catalog.create(NewNode::new("second")).await.unwrap();

        assert_eq!(a.as_str(), "node-0");
        assert_eq!(b.as_str(), "node-1");
        assert_eq!(catalog.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_registers_embedding() {
        let (catalog, index) = catalog(2);
        let id = catalog
            .create(NewNode::new("with vector").with_embedding(vec![0.5, 0.5]))
            .await
            .unwrap();

        assert_eq!(index.get(&id).await, Some(vec![0.5, 0.5]));
        let node = catalog.get(&id).await.unwrap();
        assert_eq!(node.embedding, Some(vec![0.5, 0.5]));
        assert!(!node.is_graph_only());
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_dimension_without_side_effects() {
        let (catalog, index) = catalog(3);
        let err = catalog
            .create(NewNode::new("bad").with_embedding(vec![1.0]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 1 }));
        assert_eq!(catalog.len().await, 0);
        assert_eq!(index.len().await, 0);
    }

    #[tokio::test]
    async fn test_caller_supplied_ids() {
        let (catalog, _) = catalog(2);
        catalog.create(NewNode::new("x").with_id("node-3")).await.unwrap();

        let err = catalog.create(NewNode::new("y").with_id("node-3")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateNode(_)));

        // Auto-assignment moves past the supplied sequence number
        let next = catalog.create(NewNode::new("z")).await.unwrap();
        assert_eq!(next.as_str(), "node-4");
    }

    #[tokio::test]
    async fn test_list_in_creation_order_with_offset() {
        let (catalog, _) = catalog(2);
        for text in ["a", "b", "c", "d"] {
            catalog.create(NewNode::new(text)).await.unwrap();
        }

        let texts: Vec<String> = catalog.list(2, 1).await.into_iter().map(|n| n.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert!(catalog.list(10, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_embedding() {
        let (catalog, index) = catalog(2);
        let id = catalog
            .create(NewNode::new("gone").with_embedding(vec![1.0, 0.0]))
            .await
            .unwrap();

        catalog.delete(&id).await.unwrap();
        assert!(catalog.get(&id).await.unwrap_err().is_not_found());
        assert_eq!(index.len().await, 0);
        assert!(matches!(catalog.delete(&id).await, Err(Error::NodeNotFound(_))));
    }

    #[tokio::test]
    async fn test_merge_metadata() {
        let (catalog, _) = catalog(2);
        let id = catalog
            .create(NewNode::new("n").with_metadata(Metadata::from_json(json!({"a": 1}))))
            .await
            .unwrap();

        let node = catalog
            .merge_metadata(&id, Metadata::from_json(json!({"a": 2, "b": true})))
            .await
            .unwrap();
        assert_eq!(node.metadata.get("a"), Some(&json!(2)));
        assert_eq!(node.metadata.get("b"), Some(&json!(true)));
        assert_eq!(node.text, "n");
    }

    #[tokio::test]
    async fn test_restore_resumes_counter() {
        let (catalog, _) = catalog(2);
        let record = NodeRecord {
            id: NodeId::from_sequence(9),
            text: "restored".into(),
            metadata: Metadata::new(),
            created_at: Timestamp::now(),
        };
        catalog.restore(vec![record]).await.unwrap();

        let id = catalog.create(NewNode::new("fresh")).await.unwrap();
        assert_eq!(id.as_str(), "node-10");
        assert_eq!(catalog.entries().await.len(), 2);
    }
}
