use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Metadata = BTreeMap<String, String>;

/// Fixed-length embedding produced by the embedding service.
pub type EmbeddingVector = Vec<f32>;

// Document / chunk types

/// Text extracted from one fetched page, before splitting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub content: String,
    pub metadata: Metadata,
}

/// A bounded span of source text plus provenance metadata.
///
/// Serialized as `{page_content, metadata}` so stored payloads and API
/// responses share the LangChain document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "page_content")]
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn source_url(&self) -> Option<&str> {
        self.metadata.get("source_url").map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub vector: EmbeddingVector,
    pub payload: Chunk,
    /// Insertion order within an indexing process, used to break score ties.
    /// Ranges start from the clock when the pipeline is built.
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked descending by score, at most `top_k` long.
pub type RetrievalResult = Vec<ScoredChunk>;

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    pub answer: String,
    pub context: Vec<Chunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub chunks_indexed: usize,
}

// Upstream AI service wire types

#[derive(Debug, Serialize)]
pub struct EmbeddingRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// HTTP boundary types

#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexQuery {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub question: String,
    pub answer: String,
    pub docs: Vec<Chunk>,
}

impl From<QueryAnswer> for AnswerResponse {
    fn from(answer: QueryAnswer) -> Self {
        Self {
            question: answer.question,
            answer: answer.answer,
            docs: answer.context,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub chunks_indexed: usize,
}
