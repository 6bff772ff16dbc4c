//! Vector index over node embeddings
//!
//! The index holds node identifiers and embeddings only; node text lives in
//! the catalog. [`FlatIndex`] is the exact brute-force implementation and the
//! correctness baseline for anything approximate plugged in behind
//! [`VectorIndex`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::NodeId,
};

pub mod flat;

pub use flat::FlatIndex;

/// A node identifier paired with its cosine similarity to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: NodeId,
    pub similarity: f64,
}

/// Core trait for embedding storage and similarity search
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored embedding must have
    fn dimension(&self) -> usize;

    /// Insert or replace the embedding for `id`
    async fn upsert(&self, id: NodeId, embedding: Vec<f64>) -> Result<()>;

    /// Fetch a copy of the embedding for `id`
    async fn get(&self, id: &NodeId) -> Option<Vec<f64>>;

    /// Delete the embedding for `id`; returns whether one existed
    async fn remove(&self, id: &NodeId) -> Result<bool>;

    /// The `top_k` most similar embeddings, best first
    async fn search(&self, query: &[f64], top_k: usize) -> Result<Vec<VectorMatch>>;

    /// Number of stored embeddings
    async fn len(&self) -> usize;

    /// Load previously persisted embeddings without writing them back
    async fn restore(&self, entries: Vec<(NodeId, Vec<f64>)>) -> Result<()>;
}

/// Cosine similarity in [-1, 1]; zero when either vector has zero magnitude
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    match (unit(a), unit(b)) {
        (Some(a), Some(b)) => dot(&a, &b),
        _ => 0.0,
    }
}

/// `v` scaled to length 1, or `None` for an empty, zero or non-finite vector
///
/// Components are divided by the largest magnitude before squaring so the
/// norm cannot overflow for very large finite values.
pub(crate) fn unit(v: &[f64]) -> Option<Vec<f64>> {
    if v.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let scale = v.iter().fold(0.0_f64, |max, x| max.max(x.abs()));
    if scale == 0.0 {
        return None;
    }

    let scaled: Vec<f64> = v.iter().map(|x| x / scale).collect();
    let norm = scaled.iter().map(|x| x * x).sum::<f64>().sqrt();
    Some(scaled.into_iter().map(|x| x / norm).collect())
}

/// Dot product of two unit vectors, clamped against rounding
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    let product: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    product.clamp(-1.0, 1.0)
}

/// Check an embedding against the index dimension
pub fn validate_embedding(embedding: &[f64], dimension: usize) -> Result<()> {
    if embedding.len() != dimension {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidParameter(
            "embedding contains non-finite values".to_string(),
        ));
    }
    Ok(())
}
