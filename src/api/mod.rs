//! REST wrapper over the retrieval engine
//!
//! Handlers translate engine errors into status codes; no retrieval logic
//! lives here.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/nodes", post(handlers::create_node).get(handlers::list_nodes))
        .route("/nodes/:id", get(handlers::get_node).delete(handlers::delete_node))
        .route("/nodes/:id/embedding", put(handlers::set_embedding))
        .route("/nodes/:id/metadata", patch(handlers::enrich_node))
        .route("/edges", post(handlers::create_edge).get(handlers::list_edges))
        .route("/edges/:id", get(handlers::get_edge).delete(handlers::delete_edge))
        .route("/graph/:id/neighbors", get(handlers::neighbors))
        .route("/retrieve/local", post(handlers::local_search))
        .route("/retrieve/global", post(handlers::global_search))
        .route("/retrieve/hybrid", post(handlers::hybrid_search))
        .route("/stats", get(handlers::stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
