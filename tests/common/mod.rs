#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use rag_chatbot::error::{RagError, StoreError};
use rag_chatbot::indexer::{DocumentLoader, TextSplitter};
use rag_chatbot::llm::ChatModel;
use rag_chatbot::models::{EmbeddingVector, Message, Metadata, RawDocument, RetrievalResult, StoredRecord};
use rag_chatbot::rag::{Embedder, InMemoryStore, IndexingPipeline, RetrievalPipeline, VectorStore};

pub const COLLECTION: &str = "test_collection";
pub const DIM: usize = 32;

/// Bag-of-words embedder: each lowercase word bumps one bucket.
#[derive(Default)]
pub struct HashingEmbedder {
    pub calls: AtomicUsize,
}

impl HashingEmbedder {
    fn vectorize(text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % DIM;
            vector[bucket] += 1.0;
        }
        vector
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    async fn embed_one(&self, text: &str) -> Result<EmbeddingVector, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }
}

/// Serves fixed page text per URL.
#[derive(Default)]
pub struct StaticLoader {
    pages: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl StaticLoader {
    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load(&self, url: &str) -> Result<Vec<RawDocument>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.pages.get(url).ok_or_else(|| {
            RagError::ContentExtraction(format!("No content could be extracted from {}", url))
        })?;
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), url.to_string());
        metadata.insert("title".to_string(), "Test page".to_string());
        Ok(vec![RawDocument {
            content: text.clone(),
            metadata,
        }])
    }
}

/// Records every prompt and answers with a fixed reply.
pub struct RecordingModel {
    reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn complete(&self, messages: Vec<Message>, _temperature: f32) -> Result<String, RagError> {
        let prompt = messages
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        self.reply
            .clone()
            .ok_or_else(|| RagError::Generation("model returned no content".to_string()))
    }
}

/// Counts every call before delegating to an in-memory store.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for CountingStore {
    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_collection(name, dim).await
    }

    async fn collection_dim(&self, name: &str) -> Result<Option<usize>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.collection_dim(name).await
    }

    async fn upsert(&self, name: &str, records: Vec<StoredRecord>) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(name, records).await
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<RetrievalResult, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(name, vector, limit).await
    }
}

pub struct Harness {
    pub embedder: Arc<HashingEmbedder>,
    pub loader: Arc<StaticLoader>,
    pub store: Arc<CountingStore>,
    pub model: Arc<RecordingModel>,
    pub indexing: IndexingPipeline,
    pub retrieval: RetrievalPipeline,
}

pub fn harness(loader: StaticLoader, model: RecordingModel) -> Harness {
    let embedder = Arc::new(HashingEmbedder::default());
    let loader = Arc::new(loader);
    let store = Arc::new(CountingStore::default());
    let model = Arc::new(model);

    let indexing = IndexingPipeline::new(
        loader.clone(),
        TextSplitter::new(1000, 20),
        embedder.clone(),
        store.clone(),
        COLLECTION,
    );
    let retrieval = RetrievalPipeline::new(embedder.clone(), store.clone(), model.clone(), COLLECTION);

    Harness {
        embedder,
        loader,
        store,
        model,
        indexing,
        retrieval,
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
