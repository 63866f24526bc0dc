use std::sync::Arc;

use crate::error::{RagError, StoreError};
use super::embeddings::Embedder;
use super::vector_store::VectorStore;

/// Text embedded once to learn the model's output dimension.
pub const DIMENSION_PROBE: &str = "detect-dim-sample";

/// Owns collection lifecycle. Every collection uses cosine distance.
pub struct CollectionManager {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Creates `name` unless it already exists and returns its dimension.
    ///
    /// Always makes one embedding call for the probe text, even when the
    /// collection is already there.
    pub async fn ensure_collection(&self, name: &str) -> Result<usize, RagError> {
        let probe = self.embedder.embed_one(DIMENSION_PROBE).await?;
        let dim = probe.len();
        if dim == 0 {
            return Err(RagError::EmbeddingService(
                "probe embedding has zero dimensions".to_string(),
            ));
        }

        match self.store.create_collection(name, dim).await {
            Ok(()) => {
                tracing::info!("Collection {} created successfully with dim={}", name, dim);
                Ok(dim)
            }
            Err(StoreError::AlreadyExists(_)) => {
                let existing = self.store.collection_dim(name).await?.unwrap_or(dim);
                if existing != dim {
                    return Err(RagError::Collection(format!(
                        "collection `{}` stores {}-dimensional vectors but the embedding model produces {}",
                        name, existing, dim
                    )));
                }
                tracing::info!("Collection {} already exists, continuing", name);
                Ok(existing)
            }
            Err(e) => {
                tracing::error!("Creating collection {} failed: {}", name, e);
                Err(e.into())
            }
        }
    }
}
