//! OpenAI-compatible embeddings client.
//!
//! Works with any endpoint exposing `POST {base_url}/embeddings` in the
//! OpenAI format (OpenAI, Ollama, vLLM, Together AI, ...).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use syllabus_core::error::IndexError;
use syllabus_core::Embedder;
use tracing::debug;

pub struct OpenAiEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            dimensions,
            client,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
            "dimensions": self.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);

        debug!(model = %self.model, count = texts.len(), "Sending embedding request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(texts));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| IndexError::Unavailable {
            backend: "openai-embeddings".into(),
            reason: e.to_string(),
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(IndexError::EmbeddingFailed(format!("status {status}: {error_body}")));
        }

        let api_resp: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| {
                IndexError::EmbeddingFailed(format!("Failed to parse embedding response: {e}"))
            })?;

        let embeddings = order_embeddings(api_resp);
        if embeddings.len() != texts.len() {
            return Err(IndexError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        Ok(embeddings)
    }
}

/// Order vectors by their input position.
fn order_embeddings(resp: EmbeddingApiResponse) -> Vec<Vec<f32>> {
    let mut data = resp.data;
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
