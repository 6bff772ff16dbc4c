use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::*,
    api::{ApiError, ApiResult, ApiState},
    catalog::NewNode,
    graph::{NewEdge, DEFAULT_EDGE_WEIGHT},
    hybrid::{
        DeletedNode, EngineStats, GlobalResponse, RetrievalResponse, TraversalResponse,
    },
    types::{Edge, EdgeId, Metadata, Node, NodeId},
};

/// Page size used when a list request gives no limit
const DEFAULT_PAGE_SIZE: usize = 100;

/// Check health status of the API
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.uptime().as_secs(),
    })
}

/// Create a new node
pub async fn create_node(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateNodeRequest>,
) -> ApiResult<(StatusCode, Json<CreateNodeResponse>)> {
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }

    let node = NewNode {
        text: request.text,
        metadata: request.metadata,
        embedding: request.embedding,
        id: request.id,
    };
    let node_id = state.engine.create_node(node).await?;
    Ok((StatusCode::CREATED, Json(CreateNodeResponse { node_id })))
}

/// List nodes in creation order
pub async fn list_nodes(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Node>>> {
    let nodes = state
        .engine
        .list_nodes(
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(nodes))
}

pub async fn get_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.engine.get_node(&NodeId::from(id)).await?))
}

/// Delete a node and every edge touching it
pub async fn delete_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedNode>> {
    Ok(Json(state.engine.delete_node(&NodeId::from(id)).await?))
}

pub async fn set_embedding(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(request): Json<SetEmbeddingRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .set_embedding(&NodeId::from(id), request.embedding)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Merge metadata into a node
pub async fn enrich_node(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(metadata): Json<Metadata>,
) -> ApiResult<Json<Node>> {
    Ok(Json(state.engine.enrich_node(&NodeId::from(id), metadata).await?))
}

/// Create a new edge
pub async fn create_edge(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateEdgeRequest>,
) -> ApiResult<(StatusCode, Json<Edge>)> {
    let edge = NewEdge::new(request.source, request.target, request.relationship_type)
        .with_weight(request.weight.unwrap_or(DEFAULT_EDGE_WEIGHT))
        .with_metadata(request.metadata);
    let edge = state.engine.create_edge(edge).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn list_edges(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<Edge>>> {
    let edges = state
        .engine
        .list_edges(
            params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(edges))
}

pub async fn get_edge(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Edge>> {
    Ok(Json(state.engine.get_edge(&EdgeId::from(id.as_str())).await?))
}

pub async fn delete_edge(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Edge>> {
    Ok(Json(state.engine.remove_edge(&EdgeId::from(id.as_str())).await?))
}

/// Nodes reachable from a start node
pub async fn neighbors(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Query(params): Query<TraverseParams>,
) -> ApiResult<Json<TraversalResponse>> {
    let depth = params.depth.unwrap_or(state.config.default_depth);
    Ok(Json(state.engine.traverse(&NodeId::from(id), depth).await?))
}

/// Vector-only retrieval
pub async fn local_search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<LocalSearchRequest>,
) -> ApiResult<Json<RetrievalResponse>> {
    let top_k = request.top_k.unwrap_or(state.config.default_top_k);
    let response = state
        .engine
        .local_search(&request.query, request.query_embedding, top_k)
        .await?;
    Ok(Json(response))
}

/// Graph-only retrieval
pub async fn global_search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<GlobalSearchRequest>,
) -> ApiResult<Json<GlobalResponse>> {
    let depth = request.depth.unwrap_or(state.config.default_depth);
    let top_k = request.top_k.unwrap_or(state.config.default_top_k);
    let response = state
        .engine
        .global_search_top_k(&request.query, depth, top_k)
        .await?;
    Ok(Json(response))
}

/// Fused retrieval
pub async fn hybrid_search(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<HybridSearchRequest>,
) -> ApiResult<Json<RetrievalResponse>> {
    let config = &state.config;
    let response = state
        .engine
        .hybrid_search(
            &request.query,
            request.query_embedding,
            request.top_k.unwrap_or(config.default_top_k),
            request.vector_weight.unwrap_or(config.vector_weight),
            request.graph_weight.unwrap_or(config.graph_weight),
            request.rerank,
        )
        .await?;
    Ok(Json(response))
}

pub async fn stats(State(state): State<Arc<ApiState>>) -> ApiResult<Json<EngineStats>> {
    Ok(Json(state.engine.stats().await?))
}
