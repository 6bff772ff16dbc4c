//! Exact brute-force vector index
//!
//! Every search scores the full corpus. Scoring switches to a rayon parallel
//! scan once the corpus passes the configured threshold; results are identical
//! either way.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::gauge;
use rayon::prelude::*;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{Error, Result},
    persistence::{NoopPersistence, Persistence},
    types::NodeId,
    vector::{dot, unit, validate_embedding, VectorIndex, VectorMatch},
};

#[derive(Debug)]
struct Entry {
    id: NodeId,
    /// Insertion order; breaks similarity ties
    seq: u64,
    vector: Vec<f64>,
    /// Normalised copy of `vector`; `None` for the zero vector
    unit: Option<Vec<f64>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    positions: HashMap<NodeId, usize>,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, id: NodeId, vector: Vec<f64>) {
        let normalised = unit(&vector);
        match self.positions.get(&id) {
            Some(&pos) => {
                let entry = &mut self.entries[pos];
                entry.vector = vector;
                entry.unit = normalised;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.positions.insert(id.clone(), self.entries.len());
                self.entries.push(Entry {
                    id,
                    seq,
                    vector,
                    unit: normalised,
                });
            }
        }
    }

    fn remove(&mut self, id: &NodeId) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        self.entries.swap_remove(pos);
        if let Some(moved) = self.entries.get(pos) {
            self.positions.insert(moved.id.clone(), pos);
        }
        true
    }
}

/// Flat index that compares the query against every stored embedding
pub struct FlatIndex {
    dimension: usize,
    parallel_threshold: usize,
    inner: RwLock<Inner>,
    persistence: Arc<dyn Persistence>,
}

impl FlatIndex {
    /// Create an in-memory index for embeddings of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self::with_persistence(dimension, usize::MAX, Arc::new(NoopPersistence))
    }

    /// Create an index that records every mutation in `persistence`
    pub fn with_persistence(
        dimension: usize,
        parallel_threshold: usize,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            dimension,
            parallel_threshold,
            inner: RwLock::new(Inner::default()),
            persistence,
        }
    }
}

fn score(entry: &Entry, query: Option<&[f64]>) -> f64 {
    match (entry.unit.as_deref(), query) {
        (Some(stored), Some(query)) => dot(stored, query),
        _ => 0.0,
    }
}

fn rank(a: &(f64, u64, usize), b: &(f64, u64, usize)) -> Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert(&self, id: NodeId, embedding: Vec<f64>) -> Result<()> {
        validate_embedding(&embedding, self.dimension)?;

        let mut inner = self.inner.write().await;
        self.persistence.put_embedding(&id, &embedding).await?;
        inner.insert(id, embedding);
        gauge!("vector_index_entries").set(inner.entries.len() as f64);
        Ok(())
    }

    async fn get(&self, id: &NodeId) -> Option<Vec<f64>> {
        let inner = self.inner.read().await;
        inner
            .positions
            .get(id)
            .map(|&pos| inner.entries[pos].vector.clone())
    }

    async fn remove(&self, id: &NodeId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if !inner.positions.contains_key(id) {
            return Ok(false);
        }
        self.persistence.delete_embedding(id).await?;
        let removed = inner.remove(id);
        gauge!("vector_index_entries").set(inner.entries.len() as f64);
        Ok(removed)
    }

    async fn search(&self, query: &[f64], top_k: usize) -> Result<Vec<VectorMatch>> {
        if top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be greater than 0".to_string()));
        }
        validate_embedding(query, self.dimension)?;

        let query_unit = unit(query);
        let inner = self.inner.read().await;

        // (similarity, insertion seq, position)
        let mut scored: Vec<(f64, u64, usize)> = if inner.entries.len() >= self.parallel_threshold {
            inner
                .entries
                .par_iter()
                .enumerate()
                .map(|(pos, entry)| (score(entry, query_unit.as_deref()), entry.seq, pos))
                .collect()
        } else {
            inner
                .entries
                .iter()
                .enumerate()
                .map(|(pos, entry)| (score(entry, query_unit.as_deref()), entry.seq, pos))
                .collect()
        };

        if top_k < scored.len() {
            scored.select_nth_unstable_by(top_k - 1, rank);
            scored.truncate(top_k);
        }
        scored.sort_by(rank);

        debug!(candidates = inner.entries.len(), returned = scored.len(), "Flat vector search");

        Ok(scored
            .into_iter()
            .map(|(similarity, _, pos)| VectorMatch {
                id: inner.entries[pos].id.clone(),
                similarity,
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    async fn restore(&self, entries: Vec<(NodeId, Vec<f64>)>) -> Result<()> {
        let mut inner = self.inner.write().await;
        for (id, embedding) in entries {
            validate_embedding(&embedding, self.dimension)?;
            inner.insert(id, embedding);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(matches: &[VectorMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = FlatIndex::new(2);
        index.upsert(NodeId::from("east"), vec![1.0, 0.0]).await.unwrap();
        index.upsert(NodeId::from("north"), vec![0.0, 1.0]).await.unwrap();
        index.upsert(NodeId::from("north-east"), vec![1.0, 1.0]).await.unwrap();

        let results = index.search(&[1.0, 0.1], 3).await.unwrap();
        assert_eq!(ids(&results), vec!["east", "north-east", "north"]);
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn test_ties_broken_by_insertion_order() {
        let index = FlatIndex::new(2);
        for name in ["c", "a", "b"] {
            index.upsert(NodeId::from(name), vec![2.0, 2.0]).await.unwrap();
        }

        let results = index.search(&[1.0, 1.0], 2).await.unwrap();
        assert_eq!(ids(&results), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keeps_order() {
        let index = FlatIndex::new(2);
        index.upsert(NodeId::from("a"), vec![1.0, 0.0]).await.unwrap();
        index.upsert(NodeId::from("b"), vec![1.0, 0.0]).await.unwrap();
        index.upsert(NodeId::from("a"), vec![1.0, 0.0]).await.unwrap();

        assert_eq!(index.len().await, 2);
        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(ids(&results), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let index = FlatIndex::new(3);
        let err = index.upsert(NodeId::from("a"), vec![1.0]).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 1 }));

        let err = index.search(&[1.0, 2.0], 1).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_zero_top_k_rejected() {
        let index = FlatIndex::new(2);
        assert!(matches!(
            index.search(&[1.0, 0.0], 0).await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_keeps_positions_consistent() {
        let index = FlatIndex::new(2);
        for (name, v) in [("a", [1.0, 0.0]), ("b", [0.0, 1.0]), ("c", [1.0, 1.0])] {
            index.upsert(NodeId::from(name), v.to_vec()).await.unwrap();
        }

        assert!(index.remove(&NodeId::from("a")).await.unwrap());
        assert!(!index.remove(&NodeId::from("a")).await.unwrap());
        assert_eq!(index.get(&NodeId::from("c")).await, Some(vec![1.0, 1.0]));
        assert_eq!(index.len().await, 2);

        let results = index.search(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(ids(&results), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_huge_components_score_finite() {
        let index = FlatIndex::new(4);
        index.upsert(NodeId::from("huge"), vec![1e200, 0.0, 0.0, 0.0]).await.unwrap();
        index.upsert(NodeId::from("small"), vec![0.5, 0.5, 0.0, 0.0]).await.unwrap();

        for query in [[1e200, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]] {
            let results = index.search(&query, 2).await.unwrap();
            assert_eq!(ids(&results), vec!["huge", "small"]);
            assert!((results[0].similarity - 1.0).abs() < 1e-12);
            assert!(results.iter().all(|m| m.similarity.is_finite()));
        }
    }

    #[tokio::test]
    async fn test_parallel_scan_matches_sequential() {
        let sequential = FlatIndex::new(3);
        let parallel = FlatIndex::with_persistence(3, 1, Arc::new(NoopPersistence));

        for i in 0..200u32 {
            let f = i as f64;
            let v = vec![f.sin(), f.cos(), (f * 0.3).sin()];
            sequential.upsert(NodeId::from_sequence(i as u64), v.clone()).await.unwrap();
            parallel.upsert(NodeId::from_sequence(i as u64), v).await.unwrap();
        }

        let query = [0.2, -0.7, 0.4];
        assert_eq!(
            sequential.search(&query, 10).await.unwrap(),
            parallel.search(&query, 10).await.unwrap()
        );
    }
}
