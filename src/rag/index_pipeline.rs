use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::RagError;
use crate::indexer::chunker::TextSplitter;
use crate::indexer::loader::{validate_url, DocumentLoader};
use crate::models::{IndexReport, StoredRecord};
use super::collection::CollectionManager;
use super::embeddings::Embedder;
use super::vector_store::VectorStore;

/// Records per upsert call.
pub const UPSERT_BATCH_SIZE: usize = 64;

/// Fetch → split → embed → store for a single URL.
///
/// Records from earlier upsert batches stay in the store if a later batch
/// fails; there is no rollback.
pub struct IndexingPipeline {
    loader: Arc<dyn DocumentLoader>,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collections: CollectionManager,
    collection_name: String,
    next_seq: AtomicU64,
}

impl IndexingPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            collections: CollectionManager::new(embedder.clone(), store.clone()),
            loader,
            splitter,
            embedder,
            store,
            collection_name: collection_name.into(),
            next_seq: AtomicU64::new(
                Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64,
            ),
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Creates the configured collection if needed and returns its dimension.
    pub async fn ensure_collection(&self) -> Result<usize, RagError> {
        self.collections.ensure_collection(&self.collection_name).await
    }

    /// Indexes `url`.
    ///
    /// A malformed URL is rejected with a bare `InvalidInput` before any
    /// network or store call; every later failure comes back as
    /// `RagError::Indexing` carrying the URL.
    pub async fn index_url(&self, url: &str) -> Result<IndexReport, RagError> {
        let url = url.trim();
        validate_url(url)?;
        tracing::info!("Attempting to index URL: {}", url);

        let report = self
            .run(url)
            .await
            .map_err(|e| RagError::indexing(url, e))?;

        tracing::info!(
            "Successfully uploaded {} chunks from {} to collection {}",
            report.chunks_indexed,
            url,
            self.collection_name
        );
        Ok(report)
    }

    /// Claims `count` consecutive sequence numbers.
    ///
    /// The counter starts at the clock (nanoseconds) when the pipeline is built
    /// and only moves forward, so concurrent `index_url` calls get disjoint ranges.
    fn reserve_seq(&self, count: usize) -> u64 {
        self.next_seq.fetch_add(count as u64, Ordering::Relaxed)
    }

    async fn run(&self, url: &str) -> Result<IndexReport, RagError> {
        let dim = self.ensure_collection().await?;

        let documents = self.loader.load(url).await?;
        if documents.is_empty() {
            return Err(RagError::ContentExtraction(format!(
                "No content could be extracted from {}. The site may be blocking scrapers or the URL may be invalid.",
                url
            )));
        }

        let mut chunks = self.splitter.split(&documents)?;
        for chunk in &mut chunks {
            chunk.metadata.insert("source_url".to_string(), url.to_string());
        }
        tracing::info!("Split {} into {} chunks", url, chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_many(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingService(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(RagError::Collection(format!(
                "embedding has {} dimensions, collection `{}` expects {}",
                bad.len(),
                self.collection_name,
                dim
            )));
        }

        let base_seq = self.reserve_seq(chunks.len());
        let records: Vec<StoredRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| StoredRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: chunk,
                seq: base_seq + i as u64,
            })
            .collect();

        let chunks_indexed = records.len();
        let mut pending = records.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<StoredRecord> = pending.by_ref().take(UPSERT_BATCH_SIZE).collect();
            self.store.upsert(&self.collection_name, batch).await?;
        }

        Ok(IndexReport { chunks_indexed })
    }
}
