//! HTTP embedding provider
//!
//! Speaks the `{model, prompt}` -> `{embedding}` protocol used by local model
//! servers such as Ollama's `/api/embeddings`.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Config,
    embedding::EmbeddingProvider,
    error::{Error, Result},
    vector::validate_embedding,
};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Embedding provider backed by a remote HTTP endpoint
pub struct HttpEmbeddingProvider {
    client: Client,
    endpoint: Url,
    model: String,
    dimension: usize,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        dimension: usize,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            dimension,
            max_retries,
            initial_backoff: Duration::from_millis(200),
        })
    }

    /// Build a provider from `config`, or `None` when no endpoint is configured
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match &config.embedding_url {
            Some(url) => Ok(Some(Self::new(
                url,
                config.embedding_model.clone(),
                config.vector_dimension,
                config.max_retries,
                Duration::from_secs(config.request_timeout_secs),
            )?)),
            None => Ok(None),
        }
    }

    /// Override the first retry delay
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_elapsed_time(None)
            .build()
    }

    async fn request(&self, text: &str) -> std::result::Result<Vec<f64>, backoff::Error<Error>> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|err| backoff::Error::transient(Error::from(err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = Error::Embedding(format!("embedding service returned {}: {}", status, body));
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(backoff::Error::transient(err))
            } else {
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| backoff::Error::permanent(Error::from(err)))?;

        validate_embedding(&parsed.embedding, self.dimension).map_err(backoff::Error::permanent)?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut backoff = self.backoff();
        let mut retries = 0;

        loop {
            match self.request(text).await {
                Ok(embedding) => {
                    debug!(model = %self.model, retries, "Generated embedding");
                    return Ok(embedding);
                }
                Err(backoff::Error::Permanent(err)) => return Err(err),
                Err(backoff::Error::Transient { err, retry_after }) => {
                    if retries >= self.max_retries {
                        return Err(err);
                    }
                    retries += 1;
                    let delay = retry_after
                        .or_else(|| backoff.next_backoff())
                        .unwrap_or(self.initial_backoff);
                    warn!(
                        error = %err,
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
