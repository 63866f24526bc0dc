use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config::Config as VectorsConfigKind, CreateCollectionBuilder, Distance, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::StoreError;
use crate::models::{Chunk, Metadata, RetrievalResult, ScoredChunk, StoredRecord};

const CONTENT_KEY: &str = "page_content";
const METADATA_KEY: &str = "metadata";
const SEQ_KEY: &str = "seq";

/// Backing store for named, cosine-distance vector collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fails with `StoreError::AlreadyExists` when `name` is taken.
    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), StoreError>;

    /// Vector size of an existing collection, `None` if it does not exist.
    async fn collection_dim(&self, name: &str) -> Result<Option<usize>, StoreError>;

    async fn upsert(&self, name: &str, records: Vec<StoredRecord>) -> Result<(), StoreError>;

    /// Up to `limit` records, best match first; ties go to the earlier insertion.
    ///
    /// Backends that cut to `limit` before ordering ties (Qdrant) only order
    /// the records they return: which of several tied records fills the last
    /// slot is the backend's choice.
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<RetrievalResult, StoreError>;
}

/// Descending score, then ascending insertion sequence.
fn rank(a: (f32, u64), b: (f32, u64)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then(a.1.cmp(&b.1))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// Qdrant

pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, StoreError> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| {
                tracing::error!("Qdrant client build failed: {:?}", e);
                StoreError::Backend(format!("Qdrant client build failed: {}", e))
            })?;
        Ok(Self { client })
    }
}

fn backend<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn chunk_payload(chunk: &Chunk, seq: u64) -> JsonMap<String, JsonValue> {
    let metadata: JsonMap<String, JsonValue> = chunk
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();

    let mut payload = JsonMap::new();
    payload.insert(CONTENT_KEY.to_string(), JsonValue::String(chunk.text.clone()));
    payload.insert(METADATA_KEY.to_string(), JsonValue::Object(metadata));
    payload.insert(SEQ_KEY.to_string(), JsonValue::from(seq));
    payload
}

/// Rebuilds a chunk from a point written with `chunk_payload`.
///
/// Points without `page_content` are skipped; a missing `seq` sorts last among ties.
fn scored_chunk(point: ScoredPoint) -> Option<(u64, ScoredChunk)> {
    let text = point.payload.get(CONTENT_KEY)?.as_str()?.clone();

    let mut metadata = Metadata::new();
    if let Some(fields) = point.payload.get(METADATA_KEY).and_then(|v| v.as_struct()) {
        for (key, value) in &fields.fields {
            if let Some(s) = value.as_str() {
                metadata.insert(key.clone(), s.clone());
            }
        }
    }
    let seq = point
        .payload
        .get(SEQ_KEY)
        .and_then(|v| v.as_integer())
        .map_or(u64::MAX, |n| n as u64);

    Some((
        seq,
        ScoredChunk {
            chunk: Chunk { text, metadata },
            score: point.score,
        },
    ))
}

fn rank_points(points: Vec<ScoredPoint>) -> RetrievalResult {
    let mut ranked: Vec<(u64, ScoredChunk)> = points.into_iter().filter_map(scored_chunk).collect();
    ranked.sort_by(|a, b| rank((a.1.score, a.0), (b.1.score, b.0)));
    ranked.into_iter().map(|(_, scored)| scored).collect()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), StoreError> {
        let created = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
            )
            .await;

        match created {
            Ok(_) => Ok(()),
            // Existence is confirmed with the store, not parsed from `e`.
            Err(e) => match self.client.collection_exists(name).await {
                Ok(true) => Err(StoreError::AlreadyExists(name.to_string())),
                _ => Err(backend(e)),
            },
        }
    }

    async fn collection_dim(&self, name: &str) -> Result<Option<usize>, StoreError> {
        if !self.client.collection_exists(name).await.map_err(backend)? {
            return Ok(None);
        }
        let info = self.client.collection_info(name).await.map_err(backend)?;
        let dim = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|config| match config {
                VectorsConfigKind::Params(params) => Some(params.size as usize),
                VectorsConfigKind::ParamsMap(_) => None,
            });
        dim.map(Some).ok_or_else(|| {
            StoreError::Backend(format!("collection `{}` has no single vector config", name))
        })
    }

    async fn upsert(&self, name: &str, records: Vec<StoredRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|r| PointStruct::new(r.id, r.vector, chunk_payload(&r.payload, r.seq)))
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, points).wait(true))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<RetrievalResult, StoreError> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, vector.to_vec(), limit as u64).with_payload(true),
            )
            .await
            .map_err(backend)?;

        Ok(rank_points(response.result))
    }
}

// In-process

struct MemoryCollection {
    dim: usize,
    records: Vec<StoredRecord>,
}

/// Process-local store. Records live only as long as the process.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held in `name`, zero if it does not exist.
    pub fn len(&self, name: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(name).map_or(0, |col| col.records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn create_collection(&self, name: &str, dim: usize) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if collections.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dim,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn collection_dim(&self, name: &str) -> Result<Option<usize>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(name).map(|c| c.dim))
    }

    async fn upsert(&self, name: &str, records: Vec<StoredRecord>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != collection.dim) {
            return Err(StoreError::DimensionMismatch {
                expected: collection.dim,
                actual: bad.vector.len(),
            });
        }
        collection.records.extend(records);
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<RetrievalResult, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if vector.len() != collection.dim {
            return Err(StoreError::DimensionMismatch {
                expected: collection.dim,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(f32, u64, &StoredRecord)> = collection
            .records
            .iter()
            .map(|r| (cosine_similarity(vector, &r.vector), r.seq, r))
            .collect();
        scored.sort_by(|a, b| rank((a.0, a.1), (b.0, b.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, _, record)| ScoredChunk {
                chunk: record.payload.clone(),
                score,
            })
            .collect())
    }
}
