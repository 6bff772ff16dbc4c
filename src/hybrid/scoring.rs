//! Per-node relevance scoring
//!
//! Vector relevance is raw cosine similarity (see [`crate::vector::cosine_similarity`]).
//! Graph relevance is a lexical-match heuristic boosted by node degree. It is
//! not semantic; [`GraphScorer`] is the seam for replacing it.

use std::collections::HashSet;

/// Lower-cased, whitespace-separated tokens, duplicates kept
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Distinct tokens, for set comparisons
pub fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Scores nodes against a query using text and connectivity
///
/// Implementations must return scores in [0, 1] that do not decrease when
/// either the overlap or the degree grows.
pub trait GraphScorer: Send + Sync {
    /// Fraction of query tokens found in `text`, in [0, 1]
    fn overlap(&self, query_tokens: &[String], text: &str) -> f64;

    /// Combine an overlap ratio with the node's degree
    fn score(&self, overlap: f64, degree: usize) -> f64;

    fn name(&self) -> &'static str;
}

/// Substring token matching plus a fixed boost per incident edge
#[derive(Debug, Clone, Copy)]
pub struct LexicalScorer {
    degree_boost: f64,
}

impl LexicalScorer {
    pub fn new(degree_boost: f64) -> Self {
        Self { degree_boost }
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl GraphScorer for LexicalScorer {
    fn overlap(&self, query_tokens: &[String], text: &str) -> f64 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let haystack = text.to_lowercase();
        let matching = query_tokens
            .iter()
            .filter(|token| haystack.contains(token.as_str()))
            .count();
        matching as f64 / query_tokens.len() as f64
    }

    fn score(&self, overlap: f64, degree: usize) -> f64 {
        (overlap + degree as f64 * self.degree_boost).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "lexical"
    }
}
