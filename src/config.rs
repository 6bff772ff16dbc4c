use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Configuration for the retrieval engine and its server wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Embedding dimension enforced by the vector index
    pub vector_dimension: usize,

    /// Result count used when a caller does not supply one
    pub default_top_k: usize,

    /// Graph hop limit used when a caller does not supply one
    pub default_depth: usize,

    /// Default weight of the vector signal in hybrid fusion
    pub vector_weight: f64,

    /// Default weight of the graph signal in hybrid fusion
    pub graph_weight: f64,

    /// Maximum number of edges attached to a response for context
    pub relationship_limit: usize,

    /// Hybrid queries pull `top_k * candidate_pool_factor` vector candidates
    pub candidate_pool_factor: usize,

    /// Corpus size above which the flat index scores in parallel
    pub parallel_scan_threshold: usize,

    /// Graph score added per incident edge
    pub degree_boost: f64,

    /// Append-only mutation log; in-memory only when unset
    pub data_path: Option<PathBuf>,

    /// Endpoint of an external embedding service
    pub embedding_url: Option<String>,

    /// Model name sent to the embedding service
    pub embedding_model: String,

    /// Maximum number of retries for embedding requests
    pub max_retries: u32,

    /// Request timeout in seconds for embedding requests
    pub request_timeout_secs: u64,

    /// Address the HTTP wrapper binds to
    pub bind_addr: String,
}

impl Config {
    /// Create a new configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            vector_dimension: env_or("HYBRID_VECTOR_DIMENSION", defaults.vector_dimension)?,
            default_top_k: env_or("HYBRID_DEFAULT_TOP_K", defaults.default_top_k)?,
            default_depth: env_or("HYBRID_DEFAULT_DEPTH", defaults.default_depth)?,
            vector_weight: env_or("HYBRID_VECTOR_WEIGHT", defaults.vector_weight)?,
            graph_weight: env_or("HYBRID_GRAPH_WEIGHT", defaults.graph_weight)?,
            relationship_limit: env_or("HYBRID_RELATIONSHIP_LIMIT", defaults.relationship_limit)?,
            candidate_pool_factor: env_or(
                "HYBRID_CANDIDATE_POOL_FACTOR",
                defaults.candidate_pool_factor,
            )?,
            parallel_scan_threshold: env_or(
                "HYBRID_PARALLEL_SCAN_THRESHOLD",
                defaults.parallel_scan_threshold,
            )?,
            degree_boost: env_or("HYBRID_DEGREE_BOOST", defaults.degree_boost)?,
            data_path: env::var("HYBRID_DATA_PATH").ok().map(PathBuf::from),
            embedding_url: env::var("HYBRID_EMBEDDING_URL").ok(),
            embedding_model: env::var("HYBRID_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            max_retries: env_or("HYBRID_MAX_RETRIES", defaults.max_retries)?,
            request_timeout_secs: env_or(
                "HYBRID_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            bind_addr: env::var("HYBRID_BIND_ADDR").unwrap_or(defaults.bind_addr),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create a new configuration for testing
    pub fn for_testing() -> Self {
        Self {
            vector_dimension: 4,
            parallel_scan_threshold: 64,
            max_retries: 1,
            request_timeout_secs: 5,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.vector_dimension == 0 {
            return Err(Error::ConfigurationError("vector_dimension must be > 0".to_string()));
        }
        if self.default_top_k == 0 {
            return Err(Error::ConfigurationError("default_top_k must be > 0".to_string()));
        }
        if self.candidate_pool_factor == 0 {
            return Err(Error::ConfigurationError(
                "candidate_pool_factor must be > 0".to_string(),
            ));
        }
        for (name, weight) in [("vector_weight", self.vector_weight), ("graph_weight", self.graph_weight)] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Error::ConfigurationError(format!(
                    "{} must be within [0, 1], got {}",
                    name, weight
                )));
            }
        }
        if !self.degree_boost.is_finite() || self.degree_boost < 0.0 {
            return Err(Error::ConfigurationError(format!(
                "degree_boost must be a non-negative number, got {}",
                self.degree_boost
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_dimension: 768,
            default_top_k: 5,
            default_depth: 2,
            vector_weight: 0.6,
            graph_weight: 0.4,
            relationship_limit: 10,
            candidate_pool_factor: 4,
            parallel_scan_threshold: 4096,
            degree_boost: 0.1,
            data_path: None,
            embedding_url: None,
            embedding_model: "nomic-embed-text".to_string(),
            max_retries: 3,
            request_timeout_secs: 30,
            bind_addr: "127.0.0.1:8001".to_string(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            Error::ConfigurationError(format!("{} has an unparsable value: {:?}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Env-mutating assertions share one test so they cannot race each other.
    #[test]
    fn test_config_from_env() {
        env::set_var("HYBRID_VECTOR_DIMENSION", "384");
        env::set_var("HYBRID_DEFAULT_TOP_K", "8");
        env::set_var("HYBRID_EMBEDDING_URL", "http://localhost:11434/api/embeddings");

        let config = Config::from_env().unwrap();
        assert_eq!(config.vector_dimension, 384);
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.default_depth, 2); // Default value
        assert_eq!(
            config.embedding_url.as_deref(),
            Some("http://localhost:11434/api/embeddings")
        );

        env::set_var("HYBRID_DEFAULT_TOP_K", "many");
        assert!(matches!(Config::from_env(), Err(Error::ConfigurationError(_))));

        env::set_var("HYBRID_DEFAULT_TOP_K", "5");
        env::set_var("HYBRID_VECTOR_WEIGHT", "1.5");
        assert!(matches!(Config::from_env(), Err(Error::ConfigurationError(_))));

        env::remove_var("HYBRID_VECTOR_DIMENSION");
        env::remove_var("HYBRID_DEFAULT_TOP_K");
        env::remove_var("HYBRID_VECTOR_WEIGHT");
        env::remove_var("HYBRID_EMBEDDING_URL");
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.vector_dimension, 768);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.vector_weight, 0.6);
        assert_eq!(config.graph_weight, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_for_testing() {
        let config = Config::for_testing();
        assert_eq!(config.vector_dimension, 4);
        assert_eq!(config.max_retries, 1);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config = Config {
            vector_dimension: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
