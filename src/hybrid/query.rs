//! Query parameters for the three retrieval modes
//!
//! [`QueryParam`] is what the facade's `query` entry point dispatches on;
//! [`QueryParamBuilder`] fills in defaults from [`Config`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
};

/// Retrieval mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Vector similarity only
    Local,
    /// Lexical match plus graph connectivity only
    Global,
    /// Weighted fusion of both signals
    Hybrid,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(QueryMode::Local),
            "global" => Ok(QueryMode::Global),
            "hybrid" => Ok(QueryMode::Hybrid),
            other => Err(Error::InvalidParameter(format!("unknown query mode: {}", other))),
        }
    }
}

/// A retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub mode: QueryMode,
    pub query_text: String,
    /// Embedding of `query_text`; produced by the embedding provider when absent
    #[serde(default)]
    pub query_embedding: Option<Vec<f64>>,
    pub top_k: usize,
    /// Graph hop limit; only global mode traverses, hybrid graph scores are lexical
    pub depth: usize,
    pub vector_weight: f64,
    pub graph_weight: f64,
    #[serde(default)]
    pub do_rerank: bool,
}

impl QueryParam {
    /// Start building a query with defaults taken from `config`
    pub fn builder(mode: QueryMode, query_text: impl Into<String>, config: &Config) -> QueryParamBuilder {
        QueryParamBuilder::new(mode, query_text, config)
    }

    /// Reject parameters no mode can run with
    ///
    /// The weights are not required to sum to 1; callers are expected to keep
    /// them comparable.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be greater than 0".to_string()));
        }
        for (name, weight) in [("vector_weight", self.vector_weight), ("graph_weight", self.graph_weight)] {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(Error::InvalidParameter(format!(
                    "{} must be within [0, 1], got {}",
                    name, weight
                )));
            }
        }
        if let Some(embedding) = &self.query_embedding {
            if embedding.iter().any(|x| !x.is_finite()) {
                return Err(Error::InvalidParameter(
                    "query_embedding contains non-finite values".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`QueryParam`]
#[derive(Debug, Clone)]
pub struct QueryParamBuilder {
    param: QueryParam,
}

impl QueryParamBuilder {
    pub fn new(mode: QueryMode, query_text: impl Into<String>, config: &Config) -> Self {
        Self {
            param: QueryParam {
                mode,
                query_text: query_text.into(),
                query_embedding: None,
                top_k: config.default_top_k,
                depth: config.default_depth,
                vector_weight: config.vector_weight,
                graph_weight: config.graph_weight,
                do_rerank: false,
            },
        }
    }

    pub fn embedding(mut self, embedding: Vec<f64>) -> Self {
        self.param.query_embedding = Some(embedding);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.param.top_k = top_k;
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.param.depth = depth;
        self
    }

    pub fn weights(mut self, vector_weight: f64, graph_weight: f64) -> Self {
        self.param.vector_weight = vector_weight;
        self.param.graph_weight = graph_weight;
        self
    }

    pub fn rerank(mut self, do_rerank: bool) -> Self {
        self.param.do_rerank = do_rerank;
        self
    }

    /// Validate and return the finished query
    pub fn build(self) -> Result<QueryParam> {
        self.param.validate()?;
        Ok(self.param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_uses_config_defaults() {
        let config = Config::default();
        let param = QueryParam::builder(QueryMode::Hybrid, "SpaceX location", &config)
            .build()
            .unwrap();

        assert_eq!(param.top_k, 5);
        assert_eq!(param.depth, 2);
        assert_eq!(param.vector_weight, 0.6);
        assert_eq!(param.graph_weight, 0.4);
        assert!(!param.do_rerank);
        assert!(param.query_embedding.is_none());
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let config = Config::default();
        let zero = QueryParam::builder(QueryMode::Local, "q", &config).top_k(0).build();
        assert!(matches!(zero, Err(Error::InvalidParameter(_))));

        let negative = QueryParam::builder(QueryMode::Hybrid, "q", &config)
            .weights(-0.1, 0.5)
            .build();
        assert!(matches!(negative, Err(Error::InvalidParameter(_))));

        let nan = QueryParam::builder(QueryMode::Hybrid, "q", &config)
            .weights(0.5, f64::NAN)
            .build();
        assert!(matches!(nan, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_weights_need_not_sum_to_one() {
        let config = Config::default();
        let param = QueryParam::builder(QueryMode::Hybrid, "q", &config)
            .weights(1.0, 1.0)
            .build();
        assert!(param.is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("HYBRID".parse::<QueryMode>().unwrap(), QueryMode::Hybrid);
        assert_eq!(QueryMode::Global.to_string(), "global");
        assert!("semantic".parse::<QueryMode>().is_err());
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&QueryMode::Local).unwrap();
        assert_eq!(json, "\"local\"");
    }
}
