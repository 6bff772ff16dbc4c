use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{config::Config, hybrid::HybridRetrieval};

/// Shared state handed to every handler
pub struct ApiState {
    /// Retrieval engine
    pub engine: Arc<dyn HybridRetrieval>,
    /// Defaults for requests that omit parameters
    pub config: Config,
    started_at: Instant,
}

impl ApiState {
    pub fn new(engine: Arc<dyn HybridRetrieval>, config: Config) -> Self {
        Self {
            engine,
            config,
            started_at: Instant::now(),
        }
    }

    /// Time since the state was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
