use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hybrid_retrieval::{
    api::{self, ApiState},
    Config, HybridStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        dimension = config.vector_dimension,
        data_path = ?config.data_path,
        embedding_url = ?config.embedding_url,
        "Starting hybrid retrieval server"
    );

    let store = HybridStore::from_config(config.clone())
        .await
        .context("failed to open retrieval store")?;
    let state = Arc::new(ApiState::new(Arc::new(store), config.clone()));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
