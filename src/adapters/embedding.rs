//! OpenAI-compatible embedding client.
//!
//! Works against any `/embeddings` endpoint speaking the OpenAI wire format
//! (OpenAI, DashScope compatible mode, local servers).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Embedding, EmbeddingProvider};

/// Connection settings for the embedding service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,

    /// Read from `CURATOR_EMBEDDING_API_KEY` when not set in the file
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub model: String,

    /// Requested output dimensions (model default when unset)
    pub dimensions: Option<usize>,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout_ms: 30_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedding provider over HTTP
pub struct OpenAiEmbeddingProvider {
    config: EmbeddingConfig,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build embedding HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn create_embedding(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
            encoding_format: "float",
            dimensions: self.config.dimensions,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to reach embedding service")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding service error ({}): {}", status, text.trim());
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embedding response contained no vectors")?;

        if embedding.is_empty() {
            anyhow::bail!("Embedding service returned an empty vector");
        }

        Ok(Embedding {
            dimensions: embedding.len(),
            embedding,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }
}
