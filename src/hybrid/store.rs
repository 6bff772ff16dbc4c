//! Store implementation for the hybrid retrieval engine
//!
//! [`HybridStore`] owns the node catalog, the vector index and the graph
//! store, each behind its own lock, and runs the three retrieval modes over
//! them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use rayon::prelude::*;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{
    catalog::{InMemoryCatalog, NewNode, NodeCatalog},
    config::Config,
    embedding::{EmbeddingProvider, HttpEmbeddingProvider},
    error::{Error, Result},
    graph::{GraphStore, InMemoryGraph, NewEdge},
    hybrid::{
        fusion::{FusedCandidate, FusionStrategy, ScoredCandidate, WeightedFusion},
        models::{
            confidence, DeletedNode, EngineStats, GlobalResponse, QueryResponse, QueryStats,
            RetrievalResponse, RetrievalResult, TraversalEntry, TraversalResponse,
        },
        query::{QueryMode, QueryParam},
        rerank::{by_ranking_score, rerank},
        scoring::{token_set, tokenize, GraphScorer, LexicalScorer},
        HybridRetrieval,
    },
    persistence::{JsonLogPersistence, NoopPersistence, Persistence},
    types::{Edge, EdgeId, Metadata, Node, NodeId},
    vector::{FlatIndex, VectorIndex},
};

/// Main implementation of the hybrid retrieval engine
pub struct HybridStore {
    config: Config,
    catalog: Arc<dyn NodeCatalog>,
    index: Arc<dyn VectorIndex>,
    graph: Arc<dyn GraphStore>,
    scorer: Arc<dyn GraphScorer>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    /// Held by edge creation and node deletion so no edge outlives an endpoint
    structure_lock: Mutex<()>,
    stats: RwLock<QueryStats>,
}

impl HybridStore {
    /// Create an empty, purely in-memory store
    pub fn new(config: Config) -> Result<Self> {
        Self::assemble(config, Arc::new(NoopPersistence))
    }

    /// Create a store that writes through to `persistence` and replays it first
    pub async fn open(config: Config, persistence: Arc<dyn Persistence>) -> Result<Self> {
        let store = Self::assemble(config, persistence.clone())?;

        let snapshot = persistence.load().await?;
        let (nodes, vectors, edges) = (
            snapshot.nodes.len(),
            snapshot.embeddings.len(),
            snapshot.edges.len(),
        );
        store.catalog.restore(snapshot.nodes).await?;
        store.index.restore(snapshot.embeddings).await?;
        store.graph.restore(snapshot.edges).await?;

        if nodes + edges > 0 {
            info!(nodes, vectors, edges, "Restored corpus from persistence");
        }
        Ok(store)
    }

    /// Build a store from configuration alone: log file and embedding
    /// provider are enabled when their settings are present
    pub async fn from_config(config: Config) -> Result<Self> {
        let persistence: Arc<dyn Persistence> = match &config.data_path {
            Some(path) => Arc::new(JsonLogPersistence::new(path)),
            None => Arc::new(NoopPersistence),
        };
        let provider = HttpEmbeddingProvider::from_config(&config)?;

        let store = Self::open(config, persistence).await?;
        Ok(match provider {
            Some(provider) => store.with_embedding_provider(Arc::new(provider)),
            None => store,
        })
    }

    fn assemble(config: Config, persistence: Arc<dyn Persistence>) -> Result<Self> {
        config.validate()?;

        let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::with_persistence(
            config.vector_dimension,
            config.parallel_scan_threshold,
            persistence.clone(),
        ));
        let catalog = Arc::new(InMemoryCatalog::with_persistence(index.clone(), persistence.clone()));
        let graph = Arc::new(InMemoryGraph::with_persistence(persistence));
        let scorer = Arc::new(LexicalScorer::new(config.degree_boost));

        Ok(Self {
            config,
            catalog,
            index,
            graph,
            scorer,
            embedder: None,
            structure_lock: Mutex::new(()),
            stats: RwLock::new(QueryStats::default()),
        })
    }

    /// Use `provider` for nodes and queries that arrive without an embedding
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        if provider.dimension() != self.config.vector_dimension {
            warn!(
                provider_dimension = provider.dimension(),
                index_dimension = self.config.vector_dimension,
                "Embedding provider dimension differs from the vector index"
            );
        }
        self.embedder = Some(provider);
        self
    }

    /// Replace the graph relevance heuristic
    pub fn with_scorer(mut self, scorer: Arc<dyn GraphScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The caller's embedding, or one from the provider, or none
    async fn resolve_embedding(&self, text: &str, supplied: Option<Vec<f64>>) -> Result<Option<Vec<f64>>> {
        match (supplied, &self.embedder) {
            (Some(embedding), _) => Ok(Some(embedding)),
            (None, Some(embedder)) => Ok(Some(embedder.embed(text).await?)),
            (None, None) => Ok(None),
        }
    }

    async fn vector_candidates(&self, embedding: &[f64], limit: usize) -> Result<Vec<ScoredCandidate>> {
        Ok(self
            .index
            .search(embedding, limit)
            .await?
            .into_iter()
            .map(|m| ScoredCandidate::new(m.id, m.similarity))
            .collect())
    }

    /// Nodes whose text matches at least one query token, with their overlap
    async fn lexical_matches(&self, tokens: &[String]) -> Vec<(NodeId, f64)> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let entries = self.catalog.entries().await;
        let scorer = &self.scorer;
        let matches = |(id, text): &(NodeId, Arc<str>)| {
            let overlap = scorer.overlap(tokens, text);
            (overlap > 0.0).then(|| (id.clone(), overlap))
        };

        if entries.len() >= self.config.parallel_scan_threshold {
            entries.par_iter().filter_map(matches).collect()
        } else {
            entries.iter().filter_map(matches).collect()
        }
    }

    /// Turn overlaps into graph scores, best first
    async fn score_overlaps(&self, overlaps: HashMap<NodeId, f64>) -> Vec<ScoredCandidate> {
        let ids: Vec<NodeId> = overlaps.keys().cloned().collect();
        let degrees = self.graph.degrees(&ids).await;

        let mut scored: Vec<ScoredCandidate> = overlaps
            .into_iter()
            .map(|(id, overlap)| {
                let degree = degrees.get(&id).copied().unwrap_or(0);
                let score = self.scorer.score(overlap, degree);
                ScoredCandidate::new(id, score)
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        scored
    }

    async fn graph_candidates(&self, tokens: &[String]) -> Vec<ScoredCandidate> {
        let overlaps = self.lexical_matches(tokens).await.into_iter().collect();
        self.score_overlaps(overlaps).await
    }

    /// Join fused candidates with their text; nodes deleted meanwhile are dropped
    async fn materialize(&self, fused: Vec<FusedCandidate>) -> Vec<RetrievalResult> {
        let ids: Vec<NodeId> = fused.iter().map(|c| c.id.clone()).collect();
        let texts = self.catalog.texts(&ids).await;

        fused
            .into_iter()
            .filter_map(|candidate| {
                let text = texts.get(&candidate.id)?.to_string();
                Some(RetrievalResult {
                    node_id: candidate.id,
                    text,
                    vector_score: candidate.vector_score,
                    graph_score: candidate.graph_score,
                    hybrid_score: candidate.score,
                    rerank_score: None,
                    relationships: Vec::new(),
                    latency: Duration::ZERO,
                })
            })
            .collect()
    }

    /// Fill each result's relationships; returns the bounded union
    async fn attach_relationships(&self, results: &mut [RetrievalResult]) -> Vec<Edge> {
        let ids: HashSet<NodeId> = results.iter().map(|r| r.node_id.clone()).collect();
        if ids.is_empty() {
            return Vec::new();
        }

        let edges = self.graph.edges_touching(&ids, None).await;
        let limit = self.config.relationship_limit;
        for result in results.iter_mut() {
            result.relationships = edges
                .iter()
                .filter(|e| e.touches(&result.node_id))
                .take(limit)
                .cloned()
                .collect();
        }
        edges.into_iter().take(limit).collect()
    }

    fn stamp(results: &mut [RetrievalResult], latency: Duration) {
        for result in results.iter_mut() {
            result.latency = latency;
        }
    }

    async fn record_query(&self, mode: QueryMode, latency: Duration, returned: usize, candidates: usize) {
        self.stats.write().await.record(mode, latency);

        counter!("retrieval_queries_total", "mode" => mode.as_str()).increment(1);
        histogram!("retrieval_query_duration_seconds", "mode" => mode.as_str())
            .record(latency.as_secs_f64());

        info!(
            mode = %mode,
            returned,
            candidates,
            latency_ms = latency.as_secs_f64() * 1000.0,
            "Query completed"
        );
    }

    async fn require_node(&self, id: &NodeId) -> Result<()> {
        if self.catalog.contains(id).await {
            Ok(())
        } else {
            Err(Error::NodeNotFound(id.to_string()))
        }
    }
}

#[async_trait]
impl HybridRetrieval for HybridStore {
    async fn create_node(&self, mut node: NewNode) -> Result<NodeId> {
        if node.embedding.is_none() {
            if let Some(embedder) = &self.embedder {
                node.embedding = Some(embedder.embed(&node.text).await?);
            }
        }
        self.catalog.create(node).await
    }

    async fn create_edge(&self, edge: NewEdge) -> Result<Edge> {
        let _guard = self.structure_lock.lock().await;

        for (role, id) in [("source", &edge.source), ("target", &edge.target)] {
            if !self.catalog.contains(id).await {
                return Err(Error::DanglingReference(format!(
                    "{} node {} does not exist",
                    role, id
                )));
            }
        }

        self.graph.add_edge(edge).await
    }

    async fn get_node(&self, id: &NodeId) -> Result<Node> {
        self.catalog.get(id).await
    }

    async fn list_nodes(&self, limit: usize, offset: usize) -> Result<Vec<Node>> {
        Ok(self.catalog.list(limit, offset).await)
    }

    async fn delete_node(&self, id: &NodeId) -> Result<DeletedNode> {
        let _guard = self.structure_lock.lock().await;
        self.require_node(id).await?;

        let removed = self.graph.remove_edges_for(id).await?;
        self.catalog.delete(id).await?;

        info!(node_id = %id, edges_removed = removed.len(), "Deleted node with cascade");
        Ok(DeletedNode {
            node_id: id.clone(),
            edges_removed: removed.len(),
        })
    }

    async fn set_embedding(&self, id: &NodeId, embedding: Vec<f64>) -> Result<()> {
        let _guard = self.structure_lock.lock().await;
        self.require_node(id).await?;
        self.index.upsert(id.clone(), embedding).await?;
        debug!(node_id = %id, "Attached embedding");
        Ok(())
    }

    async fn enrich_node(&self, id: &NodeId, metadata: Metadata) -> Result<Node> {
        self.catalog.merge_metadata(id, metadata).await
    }

    async fn get_edge(&self, id: &EdgeId) -> Result<Edge> {
        self.graph.get_edge(id).await
    }

    async fn remove_edge(&self, id: &EdgeId) -> Result<Edge> {
        self.graph.remove_edge(id).await
    }

    async fn list_edges(&self, limit: usize, offset: usize) -> Result<Vec<Edge>> {
        Ok(self.graph.list_edges(limit, offset).await)
    }

    #[instrument(skip(self))]
    async fn traverse(&self, start: &NodeId, depth: usize) -> Result<TraversalResponse> {
        self.require_node(start).await?;

        let reached = self.graph.neighbors(start, depth).await;
        let ids: Vec<NodeId> = reached.keys().cloned().collect();
        let texts = self.catalog.texts(&ids).await;

        let mut nodes: Vec<TraversalEntry> = reached
            .into_iter()
            .map(|(id, neighbor)| {
                let text = texts.get(&id).map(|t| t.to_string()).unwrap_or_default();
                TraversalEntry::new(id, text, neighbor)
            })
            .collect();
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.node_id.cmp(&b.node_id)));

        Ok(TraversalResponse {
            start: start.clone(),
            depth,
            nodes,
        })
    }

    #[instrument(skip(self, query_embedding))]
    async fn local_search(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f64>>,
        top_k: usize,
    ) -> Result<RetrievalResponse> {
        let started = Instant::now();
        if top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be greater than 0".to_string()));
        }

        let embedding = self.resolve_embedding(query_text, query_embedding).await?.ok_or_else(|| {
            Error::InvalidParameter(
                "query_embedding is required when no embedding provider is configured".to_string(),
            )
        })?;

        let matches = self.vector_candidates(&embedding, top_k).await?;
        let total_candidates = self.index.len().await;

        let fused = matches
            .into_iter()
            .map(|m| FusedCandidate {
                id: m.id,
                vector_score: Some(m.score),
                graph_score: None,
                score: m.score,
            })
            .collect();

        let mut results = self.materialize(fused).await;
        let relationships = self.attach_relationships(&mut results).await;

        let latency = started.elapsed();
        Self::stamp(&mut results, latency);
        self.record_query(QueryMode::Local, latency, results.len(), total_candidates)
            .await;

        Ok(RetrievalResponse {
            confidence: confidence(&results),
            results,
            relationships,
            total_candidates,
            strategy: None,
            latency,
        })
    }

    async fn global_search(&self, query_text: &str, depth: usize) -> Result<GlobalResponse> {
        self.global_search_top_k(query_text, depth, self.config.default_top_k)
            .await
    }

    #[instrument(skip(self))]
    async fn global_search_top_k(
        &self,
        query_text: &str,
        depth: usize,
        top_k: usize,
    ) -> Result<GlobalResponse> {
        let started = Instant::now();
        if top_k == 0 {
            return Err(Error::InvalidParameter("top_k must be greater than 0".to_string()));
        }

        let tokens = tokenize(query_text);
        let seeds = self.lexical_matches(&tokens).await;

        // Traversal spreads a seed's overlap, decayed by hop count.
        let mut overlaps: HashMap<NodeId, f64> = seeds.iter().cloned().collect();
        if depth > 0 {
            for (seed, ratio) in &seeds {
                for (id, neighbor) in self.graph.neighbors(seed, depth).await {
                    if neighbor.depth == 0 {
                        continue;
                    }
                    let propagated = ratio / (neighbor.depth as f64 + 1.0);
                    let overlap = overlaps.entry(id).or_insert(0.0);
                    if propagated > *overlap {
                        *overlap = propagated;
                    }
                }
            }
        }

        let reachable: HashSet<NodeId> = overlaps.keys().cloned().collect();
        let relationships = self
            .graph
            .edges_touching(&reachable, Some(self.config.relationship_limit))
            .await;

        let ranked = self.score_overlaps(overlaps).await;
        let total_candidates = ranked.len();

        let fused = ranked
            .into_iter()
            .take(top_k)
            .map(|c| FusedCandidate {
                id: c.id,
                vector_score: None,
                graph_score: Some(c.score),
                score: c.score,
            })
            .collect();

        let mut entities = self.materialize(fused).await;
        self.attach_relationships(&mut entities).await;

        let latency = started.elapsed();
        Self::stamp(&mut entities, latency);
        self.record_query(QueryMode::Global, latency, entities.len(), total_candidates)
            .await;

        Ok(GlobalResponse {
            confidence: confidence(&entities),
            entities,
            relationships,
            total_candidates,
            latency,
        })
    }

    async fn hybrid_search(
        &self,
        query_text: &str,
        query_embedding: Option<Vec<f64>>,
        top_k: usize,
        vector_weight: f64,
        graph_weight: f64,
        do_rerank: bool,
    ) -> Result<RetrievalResponse> {
        let param = QueryParam {
            mode: QueryMode::Hybrid,
            query_text: query_text.to_string(),
            query_embedding,
            top_k,
            depth: self.config.default_depth,
            vector_weight,
            graph_weight,
            do_rerank,
        };
        param.validate()?;

        let strategy = WeightedFusion::new(vector_weight, graph_weight);
        self.fuse_with(param, &strategy).await
    }

    #[instrument(
        skip(self, param, strategy),
        fields(strategy = strategy.name(), top_k = param.top_k, rerank = param.do_rerank)
    )]
    async fn fuse_with(
        &self,
        param: QueryParam,
        strategy: &dyn FusionStrategy,
    ) -> Result<RetrievalResponse> {
        let started = Instant::now();
        param.validate()?;

        let embedding = self
            .resolve_embedding(&param.query_text, param.query_embedding)
            .await?;
        if embedding.is_none() {
            debug!("No query embedding available, fusing graph signal only");
        }

        let tokens = tokenize(&param.query_text);
        let pool = param.top_k.saturating_mul(self.config.candidate_pool_factor);

        let (vector, graph) = tokio::join!(
            async {
                match &embedding {
                    Some(embedding) => self.vector_candidates(embedding, pool).await,
                    None => Ok(Vec::new()),
                }
            },
            self.graph_candidates(&tokens),
        );
        let vector = vector?;

        debug!(
            vector_candidates = vector.len(),
            graph_candidates = graph.len(),
            "Collected candidates"
        );

        let mut fused = strategy.fuse(vector, graph).await;
        let total_candidates = fused.len();

        let mut results = if param.do_rerank {
            let mut results = self.materialize(fused).await;
            rerank(&mut results, &token_set(&param.query_text));
            results.truncate(param.top_k);
            results
        } else {
            fused.truncate(param.top_k);
            let mut results = self.materialize(fused).await;
            results.sort_by(by_ranking_score);
            results
        };

        let relationships = self.attach_relationships(&mut results).await;

        let latency = started.elapsed();
        Self::stamp(&mut results, latency);
        self.record_query(QueryMode::Hybrid, latency, results.len(), total_candidates)
            .await;

        Ok(RetrievalResponse {
            confidence: confidence(&results),
            results,
            relationships,
            total_candidates,
            strategy: Some(strategy.name().to_string()),
            latency,
        })
    }

    async fn query(&self, param: QueryParam) -> Result<QueryResponse> {
        param.validate()?;

        match param.mode {
            QueryMode::Local => self
                .local_search(&param.query_text, param.query_embedding, param.top_k)
                .await
                .map(QueryResponse::Local),
            QueryMode::Global => self
                .global_search_top_k(&param.query_text, param.depth, param.top_k)
                .await
                .map(QueryResponse::Global),
            QueryMode::Hybrid => {
                let strategy = WeightedFusion::new(param.vector_weight, param.graph_weight);
                self.fuse_with(param, &strategy).await.map(QueryResponse::Hybrid)
            }
        }
    }

    async fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            node_count: self.catalog.len().await,
            edge_count: self.graph.edge_count().await,
            vector_dimension: self.index.dimension(),
            indexed_vectors: self.index.len().await,
            queries: self.stats.read().await.clone(),
        })
    }
}
