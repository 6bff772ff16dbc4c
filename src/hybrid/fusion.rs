//! Fusion strategies for combining vector and graph candidates
//!
//! Both inputs arrive ordered best first. Strategies return the full union,
//! sorted; truncation to `top_k` happens after any rerank pass.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::NodeId;

/// A node with one signal's score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub id: NodeId,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(id: NodeId, score: f64) -> Self {
        Self { id, score }
    }
}

/// A node after fusion, keeping the partial scores it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: NodeId,
    pub vector_score: Option<f64>,
    pub graph_score: Option<f64>,
    pub score: f64,
}

/// Trait defining how vector and graph candidates merge into one ranking
#[async_trait]
pub trait FusionStrategy: Send + Sync {
    /// Merge both candidate lists into one list, best first
    async fn fuse(
        &self,
        vector: Vec<ScoredCandidate>,
        graph: Vec<ScoredCandidate>,
    ) -> Vec<FusedCandidate>;

    /// Name of the fusion strategy
    fn name(&self) -> &'static str;

    /// Description of the fusion strategy
    fn description(&self) -> &'static str;
}

fn union(vector: Vec<ScoredCandidate>, graph: Vec<ScoredCandidate>) -> HashMap<NodeId, FusedCandidate> {
    let mut merged: HashMap<NodeId, FusedCandidate> = HashMap::with_capacity(vector.len() + graph.len());

    for candidate in vector {
        merged
            .entry(candidate.id.clone())
            .or_insert_with(|| FusedCandidate {
                id: candidate.id,
                vector_score: None,
                graph_score: None,
                score: 0.0,
            })
            .vector_score = Some(candidate.score);
    }
    for candidate in graph {
        merged
            .entry(candidate.id.clone())
            .or_insert_with(|| FusedCandidate {
                id: candidate.id,
                vector_score: None,
                graph_score: None,
                score: 0.0,
            })
            .graph_score = Some(candidate.score);
    }

    merged
}

fn by_score(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Linear combination of the two scores; a missing side counts as zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedFusion {
    vector_weight: f64,
    graph_weight: f64,
}

impl WeightedFusion {
    pub fn new(vector_weight: f64, graph_weight: f64) -> Self {
        Self {
            vector_weight,
            graph_weight,
        }
    }

    /// Create a balanced fusion strategy (equal weights)
    pub fn balanced() -> Self {
        Self::new(0.5, 0.5)
    }

    pub fn vector_weight(&self) -> f64 {
        self.vector_weight
    }

    pub fn graph_weight(&self) -> f64 {
        self.graph_weight
    }

    /// Fused score of a single node
    pub fn combine(&self, vector_score: Option<f64>, graph_score: Option<f64>) -> f64 {
        vector_score.unwrap_or(0.0) * self.vector_weight + graph_score.unwrap_or(0.0) * self.graph_weight
    }
}

impl Default for WeightedFusion {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}

#[async_trait]
impl FusionStrategy for WeightedFusion {
    async fn fuse(
        &self,
        vector: Vec<ScoredCandidate>,
        graph: Vec<ScoredCandidate>,
    ) -> Vec<FusedCandidate> {
        let mut fused: Vec<FusedCandidate> = union(vector, graph)
            .into_values()
            .map(|mut candidate| {
                candidate.score = self.combine(candidate.vector_score, candidate.graph_score);
                candidate
            })
            .collect();

        fused.sort_by(by_score);
        fused
    }

    fn name(&self) -> &'static str {
        "weighted_fusion"
    }

    fn description(&self) -> &'static str {
        "Combines vector and graph scores using configurable weights"
    }
}

/// Reciprocal rank fusion: each list contributes `1 / (k + rank)`, rank from 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReciprocalRankFusion {
    k: f64,
}

impl ReciprocalRankFusion {
    pub fn new(k: f64) -> Self {
        Self { k }
    }
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self::new(60.0)
    }
}

#[async_trait]
impl FusionStrategy for ReciprocalRankFusion {
    async fn fuse(
        &self,
        vector: Vec<ScoredCandidate>,
        graph: Vec<ScoredCandidate>,
    ) -> Vec<FusedCandidate> {
        let mut rank_scores: HashMap<NodeId, f64> = HashMap::new();
        for list in [&vector, &graph] {
            for (rank, candidate) in list.iter().enumerate() {
                *rank_scores.entry(candidate.id.clone()).or_insert(0.0) +=
                    1.0 / (self.k + rank as f64 + 1.0);
            }
        }

        let mut fused: Vec<FusedCandidate> = union(vector, graph)
            .into_values()
            .map(|mut candidate| {
                candidate.score = rank_scores.get(&candidate.id).copied().unwrap_or(0.0);
                candidate
            })
            .collect();

        fused.sort_by(by_score);
        fused
    }

    fn name(&self) -> &'static str {
        "reciprocal_rank_fusion"
    }

    fn description(&self) -> &'static str {
        "Combines results based on their rank position using reciprocal rank fusion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidates(items: &[(&str, f64)]) -> Vec<ScoredCandidate> {
        items
            .iter()
            .map(|(id, score)| ScoredCandidate::new(NodeId::from(*id), *score))
            .collect()
    }

    fn order(fused: &[FusedCandidate]) -> Vec<&str> {
        fused.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_weighted_union_defaults_missing_to_zero() {
        let fusion = WeightedFusion::new(0.6, 0.4);
        let fused = fusion
            .fuse(
                candidates(&[("a", 1.0), ("b", 0.5)]),
                candidates(&[("b", 1.0), ("c", 0.9)]),
            )
            .await;

        assert_eq!(order(&fused), vec!["b", "a", "c"]);
        assert!((fused[0].score - 0.7).abs() < 1e-12);
        assert_eq!(fused[1].graph_score, None);
        assert!((fused[2].score - 0.36).abs() < 1e-12);
        assert_eq!(fused[2].vector_score, None);
    }

    #[tokio::test]
    async fn test_weighted_ties_broken_by_id() {
        let fusion = WeightedFusion::balanced();
        let fused = fusion
            .fuse(candidates(&[("z", 0.5), ("m", 0.5)]), candidates(&[("a", 0.5)]))
            .await;
        assert_eq!(order(&fused), vec!["a", "m", "z"]);
    }

    #[tokio::test]
    async fn test_weighted_keeps_negative_cosine() {
        let fusion = WeightedFusion::new(0.6, 0.4);
        let fused = fusion
            .fuse(candidates(&[("opposite", -1.0)]), candidates(&[("other", 0.1)]))
            .await;

        assert_eq!(order(&fused), vec!["other", "opposite"]);
        assert!((fused[1].score + 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_weight_monotonicity() {
        // vector_score >= graph_score: raising vector_weight never lowers the score
        let (v, g) = (0.8, 0.3);
        let mut last = f64::MIN;
        for step in 0..=10 {
            let w = step as f64 / 10.0;
            let score = WeightedFusion::new(w, 0.4).combine(Some(v), Some(g));
            assert!(score >= last);
            last = score;
        }

        // a node without vector signal does not gain on one that has it
        for step in 0..=10 {
            let w = step as f64 / 10.0;
            let fusion = WeightedFusion::new(w, 0.4);
            let graph_only = fusion.combine(None, Some(0.5));
            let both = fusion.combine(Some(0.4), Some(0.5));
            assert!(both >= graph_only);
        }
    }

    #[tokio::test]
    async fn test_reciprocal_rank_fusion() {
        let fusion = ReciprocalRankFusion::default();
        let fused = fusion
            .fuse(
                candidates(&[("a", 0.9), ("b", 0.8)]),
                candidates(&[("b", 0.7), ("c", 0.6)]),
            )
            .await;

        assert_eq!(order(&fused), vec!["b", "a", "c"]);
        let expected_b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected_b).abs() < 1e-12);
        assert_eq!(fused[0].vector_score, Some(0.8));
        assert_eq!(fused[0].graph_score, Some(0.7));
        assert_eq!(fusion.name(), "reciprocal_rank_fusion");
    }
}
