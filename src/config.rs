use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, Map};
use serde::Deserialize;

const DEFAULT_ORIGINS: [&str; 2] = [
    "https://ragchatbot-client.vercel.app",
    "https://localhost:5173",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Qdrant,
    Memory,
}

/// Process configuration, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub embedding_timeout_secs: u64,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub vector_backend: VectorBackend,
    pub qdrant_url: String,
    #[serde(default)]
    pub qdrant_api_key: Option<String>,
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub client_url: String,
    #[serde(default)]
    pub extra_origins: Option<String>,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::build(Environment::default())
    }

    /// Same as `from_env`, reading keys from `vars` instead of the process environment.
    pub fn from_map(vars: Map<String, String>) -> Result<Self> {
        Self::build(Environment::default().source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self> {
        let raw = Config::builder()
            .set_default("openrouter_api_key", "")?
            .set_default("embedding_base_url", "https://openrouter.ai/api/v1")?
            .set_default("embedding_model", "openai/text-embedding-3-small")?
            .set_default("embedding_batch_size", 16)?
            .set_default("embedding_timeout_secs", 60)?
            .set_default("llm_base_url", "https://openrouter.ai/api/v1")?
            .set_default("llm_model", "openai/gpt-3.5-turbo")?
            .set_default("llm_temperature", 0.7)?
            .set_default("vector_backend", "qdrant")?
            .set_default("qdrant_url", "http://localhost:6334")?
            .set_default("collection_name", "my_collection")?
            .set_default("chunk_size", 1000)?
            .set_default("chunk_overlap", 20)?
            .set_default("top_k", 4)?
            .set_default("client_url", "http://localhost:5173")?
            .set_default("port", 8000)?
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let settings: Settings = raw
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.openrouter_api_key.trim().is_empty(),
            "OPENROUTER_API_KEY not found in environment. Set it in .env and re-run."
        );
        anyhow::ensure!(self.embedding_batch_size >= 1, "EMBEDDING_BATCH_SIZE must be at least 1");
        anyhow::ensure!(self.chunk_size >= 1, "CHUNK_SIZE must be at least 1");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
            self.chunk_overlap,
            self.chunk_size
        );
        anyhow::ensure!(self.top_k >= 1, "TOP_K must be at least 1");
        anyhow::ensure!(
            !self.collection_name.trim().is_empty(),
            "COLLECTION_NAME cannot be empty"
        );
        Ok(())
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    /// CORS origins: the client URL, the known deployments, then any extras.
    pub fn allowed_origins(&self) -> Vec<String> {
        let extras = self
            .extra_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut origins: Vec<String> = Vec::new();
        for origin in std::iter::once(self.client_url.as_str())
            .chain(DEFAULT_ORIGINS)
            .chain(extras)
        {
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_string());
            }
        }
        origins
    }
}
