use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;

use crate::error::RagError;
use crate::models::{ChatRequest, ChatResponse, Message};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completion style language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generated text for `messages`; never empty on success.
    async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String, RagError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build chat completion HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for ChatCompletionClient {
    async fn complete(&self, messages: Vec<Message>, temperature: f32) -> Result<String, RagError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Chat completion failed: {} - {}", status, error_text);
            return Err(RagError::Generation(format!(
                "model responded with status {}",
                status.as_u16()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("undecodable response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RagError::Generation("model returned no content".to_string()))
    }
}
