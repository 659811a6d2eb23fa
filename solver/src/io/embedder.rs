//! Text embeddings for category similarity scoring.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::{EmbeddingConfig, resolve_base_url};
use crate::io::responder::truncate;

const EMBEDDINGS_PATH: &str = "v1/embeddings";

/// Abstraction over embedding backends.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbedder {
    client: HttpClient,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                env::var(var).with_context(|| format!("read api key from ${var}"))?,
            ),
            None => None,
        };
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            url: format!("{}/{}", resolve_base_url(&config.base_url), EMBEDDINGS_PATH),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl Embedder for HttpEmbedder {
    #[instrument(skip_all, fields(model = %self.model))]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .with_context(|| format!("post {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "embedding request failed with status {}: {}",
                status,
                truncate(&body, 500)
            );
        }
        let parsed: EmbeddingResponse = response.json().context("parse embedding response")?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("embedding response contained no vectors"))?;
        debug!(dimensions = vector.len(), "embedding received");
        Ok(vector)
    }
}
