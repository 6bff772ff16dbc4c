//! In-memory adjacency multigraph

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{Error, Result},
    graph::{GraphStore, Neighbor, NewEdge},
    persistence::{NoopPersistence, Persistence},
    types::{Edge, EdgeId, NodeId, Timestamp},
};

#[derive(Debug, Default)]
struct Adjacency {
    /// Insertion sequence -> edge
    edges: BTreeMap<u64, Edge>,
    ids: HashMap<EdgeId, u64>,
    outgoing: HashMap<NodeId, Vec<u64>>,
    incoming: HashMap<NodeId, Vec<u64>>,
    next_seq: u64,
}

impl Adjacency {
    fn insert(&mut self, edge: Edge) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outgoing.entry(edge.source.clone()).or_default().push(seq);
        self.incoming.entry(edge.target.clone()).or_default().push(seq);
        self.ids.insert(edge.id.clone(), seq);
        self.edges.insert(seq, edge);
    }

    fn remove(&mut self, id: &EdgeId) -> Option<Edge> {
        let seq = self.ids.remove(id)?;
        let edge = self.edges.remove(&seq)?;
        detach(&mut self.outgoing, &edge.source, seq);
        detach(&mut self.incoming, &edge.target, seq);
        Some(edge)
    }

    /// Sequence numbers of every edge touching `node`, deduplicated
    fn touching(&self, node: &NodeId, into: &mut BTreeSet<u64>) {
        for map in [&self.outgoing, &self.incoming] {
            if let Some(seqs) = map.get(node) {
                into.extend(seqs.iter().copied());
            }
        }
    }

    fn degree(&self, node: &NodeId) -> usize {
        let out = self.outgoing.get(node).map_or(0, Vec::len);
        // A self-loop shows up on both sides; count it once.
        let inc = self.incoming.get(node).map_or(0, |seqs| {
            seqs.iter()
                .filter(|&&seq| self.edges.get(&seq).map_or(false, |e| !e.is_self_loop()))
                .count()
        });
        out + inc
    }
}

fn detach(map: &mut HashMap<NodeId, Vec<u64>>, node: &NodeId, seq: u64) {
    if let Some(seqs) = map.get_mut(node) {
        seqs.retain(|s| *s != seq);
        if seqs.is_empty() {
            map.remove(node);
        }
    }
}

/// Graph store keeping outgoing and incoming adjacency lists per node
pub struct InMemoryGraph {
    adjacency: RwLock<Adjacency>,
    next_id: AtomicU64,
    persistence: Arc<dyn Persistence>,
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::with_persistence(Arc::new(NoopPersistence))
    }

    pub fn with_persistence(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            adjacency: RwLock::new(Adjacency::default()),
            next_id: AtomicU64::new(0),
            persistence,
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn add_edge(&self, edge: NewEdge) -> Result<Edge> {
        if !edge.weight.is_finite() || edge.weight < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "edge weight must be a non-negative number, got {}",
                edge.weight
            )));
        }
        if edge.relationship_type.trim().is_empty() {
            return Err(Error::InvalidParameter("relationship_type must not be empty".to_string()));
        }

        let mut adjacency = self.adjacency.write().await;

        let id = loop {
            let candidate = EdgeId::from_sequence(self.next_id.fetch_add(1, Ordering::SeqCst));
            if !adjacency.ids.contains_key(&candidate) {
                break candidate;
            }
        };

        let edge = Edge {
            id,
            source: edge.source,
            target: edge.target,
            relationship_type: edge.relationship_type,
            weight: edge.weight,
            metadata: edge.metadata,
            created_at: Timestamp::now(),
        };

        self.persistence.put_edge(&edge).await?;
        adjacency.insert(edge.clone());

        counter!("graph_edges_created_total").increment(1);
        gauge!("graph_edges").set(adjacency.edges.len() as f64);
        debug!(
            edge_id = %edge.id,
            source = %edge.source,
            target = %edge.target,
            relationship = %edge.relationship_type,
            "Created edge"
        );

        Ok(edge)
    }

    async fn get_edge(&self, id: &EdgeId) -> Result<Edge> {
        let adjacency = self.adjacency.read().await;
        adjacency
            .ids
            .get(id)
            .and_then(|seq| adjacency.edges.get(seq))
            .cloned()
            .ok_or_else(|| Error::EdgeNotFound(id.to_string()))
    }

    async fn remove_edge(&self, id: &EdgeId) -> Result<Edge> {
        let mut adjacency = self.adjacency.write().await;
        if !adjacency.ids.contains_key(id) {
            return Err(Error::EdgeNotFound(id.to_string()));
        }

        self.persistence.delete_edge(id).await?;
        let edge = adjacency
            .remove(id)
            .ok_or_else(|| Error::EdgeNotFound(id.to_string()))?;
        gauge!("graph_edges").set(adjacency.edges.len() as f64);
        Ok(edge)
    }

    async fn remove_edges_for(&self, node: &NodeId) -> Result<Vec<Edge>> {
        let mut adjacency = self.adjacency.write().await;

        let mut seqs = BTreeSet::new();
        adjacency.touching(node, &mut seqs);
        let ids: Vec<EdgeId> = seqs
            .iter()
            .filter_map(|seq| adjacency.edges.get(seq).map(|e| e.id.clone()))
            .collect();

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            self.persistence.delete_edge(&id).await?;
            if let Some(edge) = adjacency.remove(&id) {
                removed.push(edge);
            }
        }

        gauge!("graph_edges").set(adjacency.edges.len() as f64);
        Ok(removed)
    }

    async fn neighbors(&self, node: &NodeId, depth: usize) -> HashMap<NodeId, Neighbor> {
        let adjacency = self.adjacency.read().await;

        let mut reached: HashMap<NodeId, Neighbor> = HashMap::new();
        reached.insert(
            node.clone(),
            Neighbor {
                edges: Vec::new(),
                depth: 0,
            },
        );

        let mut frontier: VecDeque<(NodeId, usize)> = VecDeque::from([(node.clone(), 0)]);

        while let Some((current, hops)) = frontier.pop_front() {
            if hops >= depth {
                continue;
            }
            let Some(seqs) = adjacency.outgoing.get(&current) else {
                continue;
            };

            for seq in seqs {
                let Some(edge) = adjacency.edges.get(seq) else {
                    continue;
                };
                match reached.get_mut(&edge.target) {
                    Some(entry) => {
                        // Another edge into a node discovered in this same layer
                        if entry.depth == hops + 1 {
                            entry.edges.push(edge.clone());
                        }
                    }
                    None => {
                        reached.insert(
                            edge.target.clone(),
                            Neighbor {
                                edges: vec![edge.clone()],
                                depth: hops + 1,
                            },
                        );
                        frontier.push_back((edge.target.clone(), hops + 1));
                    }
                }
            }
        }

        reached
    }

    async fn degree(&self, node: &NodeId) -> usize {
        self.adjacency.read().await.degree(node)
    }

    async fn degrees(&self, nodes: &[NodeId]) -> HashMap<NodeId, usize> {
        let adjacency = self.adjacency.read().await;
        nodes
            .iter()
            .map(|node| (node.clone(), adjacency.degree(node)))
            .collect()
    }

    async fn edges_touching(&self, nodes: &HashSet<NodeId>, limit: Option<usize>) -> Vec<Edge> {
        let adjacency = self.adjacency.read().await;

        let mut seqs = BTreeSet::new();
        for node in nodes {
            adjacency.touching(node, &mut seqs);
        }

        seqs.iter()
            .filter_map(|seq| adjacency.edges.get(seq).cloned())
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    async fn list_edges(&self, limit: usize, offset: usize) -> Vec<Edge> {
        let adjacency = self.adjacency.read().await;
        adjacency.edges.values().skip(offset).take(limit).cloned().collect()
    }

    async fn edge_count(&self) -> usize {
        self.adjacency.read().await.edges.len()
    }

    async fn restore(&self, edges: Vec<Edge>) -> Result<()> {
        let mut adjacency = self.adjacency.write().await;
        for edge in edges {
            if let Some(n) = edge.id.sequence() {
                self.next_id.fetch_max(n.saturating_add(1), Ordering::SeqCst);
            }
            if adjacency.ids.contains_key(&edge.id) {
                adjacency.remove(&edge.id);
            }
            adjacency.insert(edge);
        }
        gauge!("graph_edges").set(adjacency.edges.len() as f64);
        Ok(())
    }
}
