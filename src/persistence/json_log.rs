//! Append-only JSON-lines mutation log
//!
//! Each mutation is one line; nothing is ever rewritten in place. `load`
//! replays the log front to back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    persistence::{Persistence, Snapshot},
    types::{Edge, EdgeId, Metadata, NodeId, NodeRecord},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogRecord {
    PutNode { node: NodeRecord },
    MergeMetadata { id: NodeId, metadata: Metadata },
    DeleteNode { id: NodeId },
    PutEmbedding { id: NodeId, embedding: Vec<f64> },
    DeleteEmbedding { id: NodeId },
    PutEdge { edge: Edge },
    DeleteEdge { id: EdgeId },
}

/// Persistence backed by a single append-only file
pub struct JsonLogPersistence {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonLogPersistence {
    /// Create a log at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: LogRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }

        let file = guard
            .as_mut()
            .ok_or_else(|| Error::Persistence("log file unavailable".to_string()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for JsonLogPersistence {
    async fn put_node(&self, node: &NodeRecord) -> Result<()> {
        self.append(LogRecord::PutNode { node: node.clone() }).await
    }

    async fn merge_metadata(&self, id: &NodeId, metadata: &Metadata) -> Result<()> {
        self.append(LogRecord::MergeMetadata {
            id: id.clone(),
            metadata: metadata.clone(),
        })
        .await
    }

    async fn delete_node(&self, id: &NodeId) -> Result<()> {
        self.append(LogRecord::DeleteNode { id: id.clone() }).await
    }

    async fn put_embedding(&self, id: &NodeId, embedding: &[f64]) -> Result<()> {
        self.append(LogRecord::PutEmbedding {
            id: id.clone(),
            embedding: embedding.to_vec(),
        })
        .await
    }

    async fn delete_embedding(&self, id: &NodeId) -> Result<()> {
        self.append(LogRecord::DeleteEmbedding { id: id.clone() }).await
    }

    async fn put_edge(&self, edge: &Edge) -> Result<()> {
        self.append(LogRecord::PutEdge { edge: edge.clone() }).await
    }

    async fn delete_edge(&self, id: &EdgeId) -> Result<()> {
        self.append(LogRecord::DeleteEdge { id: id.clone() }).await
    }

    async fn load(&self) -> Result<Snapshot> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Snapshot::default());
            }
            Err(err) => return Err(err.into()),
        };

        let mut replay = Replay::default();
        let mut replayed = 0usize;

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: LogRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(err) => {
                    // A torn final write is expected after a crash.
                    warn!(line = line_no + 1, error = %err, "Skipping unreadable log record");
                    continue;
                }
            };
            replay.apply(record);
            replayed += 1;
        }

        let snapshot = replay.into_snapshot();

        debug!(
            path = %self.path.display(),
            records = replayed,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "Replayed mutation log"
        );
        Ok(snapshot)
    }
}

/// Replay state keyed by id; each entry remembers when it was (re)created
#[derive(Debug, Default)]
struct Replay {
    seq: u64,
    nodes: HashMap<NodeId, (u64, NodeRecord)>,
    embeddings: HashMap<NodeId, (u64, Vec<f64>)>,
    edges: HashMap<EdgeId, (u64, Edge)>,
}

impl Replay {
    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::PutNode { node } => {
                let seq = self.next_seq();
                self.nodes.insert(node.id.clone(), (seq, node));
            }
            LogRecord::MergeMetadata { id, metadata } => {
                if let Some((_, node)) = self.nodes.get_mut(&id) {
                    node.metadata.merge(metadata);
                }
            }
            LogRecord::DeleteNode { id } => {
                self.nodes.remove(&id);
            }
            LogRecord::PutEmbedding { id, embedding } => {
                // A replaced embedding keeps its original position.
                match self.embeddings.get_mut(&id) {
                    Some(entry) => entry.1 = embedding,
                    None => {
                        let seq = self.next_seq();
                        self.embeddings.insert(id, (seq, embedding));
                    }
                }
            }
            LogRecord::DeleteEmbedding { id } => {
                self.embeddings.remove(&id);
            }
            LogRecord::PutEdge { edge } => {
                let seq = self.next_seq();
                self.edges.insert(edge.id.clone(), (seq, edge));
            }
            LogRecord::DeleteEdge { id } => {
                self.edges.remove(&id);
            }
        }
    }

    fn into_snapshot(self) -> Snapshot {
        Snapshot {
            nodes: in_order(self.nodes.into_values()),
            embeddings: in_order(self.embeddings.into_iter().map(|(id, (seq, v))| (seq, (id, v)))),
            edges: in_order(self.edges.into_values()),
        }
    }
}

fn in_order<T>(entries: impl Iterator<Item = (u64, T)>) -> Vec<T> {
    let mut entries: Vec<(u64, T)> = entries.collect();
    entries.sort_unstable_by_key(|(seq, _)| *seq);
    entries.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use pretty_assertions::assert_eq;

    fn record(id: &str, text: &str) -> NodeRecord {
        NodeRecord {
            id: NodeId::from(id),
            text: text.into(),
            metadata: Metadata::new(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_replay_applies_in_order() {
        let mut replay = Replay::default();
        replay.apply(LogRecord::PutNode { node: record("node-0", "a") });
        replay.apply(LogRecord::PutNode { node: record("node-1", "b") });
        replay.apply(LogRecord::PutEmbedding { id: NodeId::from("node-0"), embedding: vec![1.0, 0.0] });
        replay.apply(LogRecord::PutEmbedding { id: NodeId::from("node-0"), embedding: vec![0.0, 1.0] });
        replay.apply(LogRecord::DeleteNode { id: NodeId::from("node-1") });

        let snapshot = replay.into_snapshot();
        let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["node-0"]);
        assert_eq!(snapshot.embeddings, vec![(NodeId::from("node-0"), vec![0.0, 1.0])]);
    }

    #[test]
    fn test_replay_preserves_creation_order() {
        let mut replay = Replay::default();
        for i in (0..50).rev() {
            let id = format!("node-{}", i);
            replay.apply(LogRecord::PutNode { node: record(&id, "text") });
            replay.apply(LogRecord::PutEmbedding { id: NodeId::from(id.as_str()), embedding: vec![i as f64] });
        }
        // Re-putting a node moves it to the back; metadata merges in place.
        replay.apply(LogRecord::PutNode { node: record("node-49", "again") });
        replay.apply(LogRecord::MergeMetadata {
            id: NodeId::from("node-0"),
            metadata: Metadata::from_json(serde_json::json!({"lang": "en"})),
        });
        replay.apply(LogRecord::PutEmbedding { id: NodeId::from("node-10"), embedding: vec![-1.0] });
        replay.apply(LogRecord::DeleteEmbedding { id: NodeId::from("node-20") });

        let snapshot = replay.into_snapshot();
        assert_eq!(snapshot.nodes.len(), 50);
        assert_eq!(snapshot.nodes[0].id.as_str(), "node-48");
        assert_eq!(snapshot.nodes[49].id.as_str(), "node-49");
        assert_eq!(&*snapshot.nodes[49].text, "again");
        let merged = snapshot.nodes.iter().find(|n| n.id.as_str() == "node-0").unwrap();
        assert_eq!(merged.metadata.get("lang"), Some(&serde_json::json!("en")));

        assert_eq!(snapshot.embeddings.len(), 49);
        assert_eq!(snapshot.embeddings[0], (NodeId::from("node-49"), vec![49.0]));
        let replaced = snapshot.embeddings.iter().position(|(id, _)| id.as_str() == "node-10").unwrap();
        assert_eq!(replaced, 38);
        assert_eq!(snapshot.embeddings[replaced].1, vec![-1.0]);
    }

    #[test]
    fn test_replay_edges() {
        let edge = |id: &str| Edge {
            id: EdgeId::from(id),
            source: NodeId::from("a"),
            target: NodeId::from("b"),
            relationship_type: "KNOWS".to_string(),
            weight: 1.0,
            metadata: Metadata::new(),
            created_at: Timestamp::now(),
        };

        let mut replay = Replay::default();
        for id in ["edge-0", "edge-1", "edge-2"] {
            replay.apply(LogRecord::PutEdge { edge: edge(id) });
        }
        replay.apply(LogRecord::DeleteEdge { id: EdgeId::from("edge-1") });

        let ids: Vec<String> = replay
            .into_snapshot()
            .edges
            .iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, vec!["edge-0", "edge-2"]);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let path = std::env::temp_dir().join(format!("hybrid-missing-{}.jsonl", uuid::Uuid::new_v4()));
        let log = JsonLogPersistence::new(&path);
        assert_eq!(log.load().await.unwrap(), Snapshot::default());
    }
}
