use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for nodes in the corpus
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Identifier in the dense `node-{n}` scheme
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("node-{}", n))
    }

    /// The sequence number if this id follows the `node-{n}` scheme
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix("node-")?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Unique identifier for edges in the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("edge-{}", n))
    }

    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix("edge-")?.parse().ok()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Timestamp wrapper
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Create a new timestamp with the current time
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(Utc::now())
    }
}

/// Free-form metadata attached to nodes and edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(pub HashMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Build from a JSON object; any other JSON value yields empty metadata
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map.into_iter().collect()),
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Overwrite existing keys with the entries of `other`
    pub fn merge(&mut self, other: Metadata) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A node as held by the catalog: content only, no embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub text: Arc<str>,
    pub metadata: Metadata,
    pub created_at: Timestamp,
}

/// A node as seen by callers: catalog content joined with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Option<Vec<f64>>,
    pub created_at: Timestamp,
}

impl Node {
    pub fn from_record(record: NodeRecord, embedding: Option<Vec<f64>>) -> Self {
        Self {
            id: record.id,
            text: record.text.to_string(),
            metadata: record.metadata,
            embedding,
            created_at: record.created_at,
        }
    }

    /// Nodes without an embedding only participate in graph retrieval
    pub fn is_graph_only(&self) -> bool {
        self.embedding.is_none()
    }
}

/// A typed, weighted, directed edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relationship_type: String,
    pub weight: f64,
    pub metadata: Metadata,
    pub created_at: Timestamp,
}

impl Edge {
    /// Whether `node` is the source or the target of this edge
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}
