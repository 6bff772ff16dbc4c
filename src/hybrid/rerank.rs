//! Lexical reranking pass
//!
//! A cheap heuristic that scales each fused score by keyword overlap. It can
//! reorder results with close scores; no ordering guarantee is made.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::hybrid::{models::RetrievalResult, scoring::token_set};

/// Share of the fused score kept regardless of keyword overlap
const BASE_FACTOR: f64 = 0.7;
const OVERLAP_FACTOR: f64 = 0.3;

/// Jaccard index of two token sets; zero when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Set `rerank_score` on every result and re-sort by it
pub fn rerank(results: &mut [RetrievalResult], query_tokens: &HashSet<String>) {
    for result in results.iter_mut() {
        let overlap = jaccard(query_tokens, &token_set(&result.text));
        result.rerank_score = Some(result.hybrid_score * (BASE_FACTOR + OVERLAP_FACTOR * overlap));
    }
    results.sort_by(by_ranking_score);
}

/// Descending score, ascending identifier on ties
pub(crate) fn by_ranking_score(a: &RetrievalResult, b: &RetrievalResult) -> Ordering {
    b.ranking_score()
        .total_cmp(&a.ranking_score())
        .then_with(|| a.node_id.cmp(&b.node_id))
}
