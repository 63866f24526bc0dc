use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;

use crate::error::RagError;
use crate::models::{EmbeddingRequest, EmbeddingVector};

pub const DEFAULT_BATCH_SIZE: usize = 16;
const BATCH_PAUSE: Duration = Duration::from_millis(50);

/// Turns text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, RagError>;

    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector, RagError>;
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
    batch_pause: Duration,
}

impl RemoteEmbeddingClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        if api_key.trim().is_empty() {
            return Err(RagError::EmbeddingService("missing embedding API key".to_string()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| RagError::EmbeddingService("invalid embedding API key".to_string()))?,
        );
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rag-chatbot/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::EmbeddingService(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            batch_size: batch_size.max(1),
            batch_pause: BATCH_PAUSE,
        })
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn call(&self, inputs: &[String]) -> Result<Vec<EmbeddingVector>, RagError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingService(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Embedding request failed: {} - {}", status, body);
            return Err(RagError::EmbeddingService(format!(
                "embedding service responded with status {}",
                status.as_u16()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingService(format!("undecodable response: {}", e)))?;
        let vectors = parse_embedding_response(&body)?;

        if vectors.len() != inputs.len() {
            return Err(RagError::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for RemoteEmbeddingClient {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, RagError> {
        let mut all = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            if i > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
            tracing::debug!("Embedding batch {} ({} texts)", i, batch.len());
            all.extend(self.call(batch).await?);
        }
        Ok(all)
    }

    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector, RagError> {
        self.call(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingService("empty embedding returned for query".to_string()))
    }
}

/// Normalizes the `data` array of an embeddings response.
///
/// Items may be `{"embedding": [...]}`, `{"vector": [...]}` or a bare array.
pub fn parse_embedding_response(body: &Value) -> Result<Vec<EmbeddingVector>, RagError> {
    let items = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            RagError::EmbeddingService("unexpected embeddings response structure".to_string())
        })?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let raw = item
                .get("embedding")
                .or_else(|| item.get("vector"))
                .unwrap_or(item);
            parse_vector(raw).ok_or_else(|| {
                RagError::EmbeddingService(format!("unexpected embedding item format at index {}", i))
            })
        })
        .collect()
}

fn parse_vector(value: &Value) -> Option<EmbeddingVector> {
    value
        .as_array()?
        .iter()
        .map(|n| n.as_f64().map(|f| f as f32))
        .collect()
}
