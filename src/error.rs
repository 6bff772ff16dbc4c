use thiserror::Error;
use std::io;

/// Error types for the hybrid retrieval engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl Error {
    /// Whether the error reports an unknown node or edge identifier
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NodeNotFound(_) | Error::EdgeNotFound(_))
    }
}

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Embedding(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NodeNotFound("node-7".to_string());
        assert_eq!(err.to_string(), "Node not found: node-7");

        let err = Error::DimensionMismatch { expected: 768, actual: 3 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 768, got 3");
    }

    #[test]
    fn test_not_found_class() {
        assert!(Error::NodeNotFound("a".into()).is_not_found());
        assert!(Error::EdgeNotFound("edge-0".into()).is_not_found());
        assert!(!Error::DanglingReference("a".into()).is_not_found());
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
