//! Embedding generation collaborator
//!
//! The engine never fabricates embeddings. When a provider is configured the
//! facade asks it for vectors; otherwise nodes created without one stay
//! graph-only.

use async_trait::async_trait;

use crate::error::Result;

pub mod http;

pub use http::HttpEmbeddingProvider;

/// Maps text to a vector of fixed dimension
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    /// Dimension of every vector this provider returns
    fn dimension(&self) -> usize;

    /// Model identifier, for logging
    fn model_name(&self) -> String;
}
