use thiserror::Error;

/// Failure taxonomy shared by the ingestion and retrieval pipelines.
#[derive(Debug, Error)]
pub enum RagError {
    /// Malformed or empty caller input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The fetch worked (or was attempted) but produced no usable text.
    #[error("content extraction failed: {0}")]
    ContentExtraction(String),
    #[error("embedding service error: {0}")]
    EmbeddingService(String),
    #[error("generation error: {0}")]
    Generation(String),
    /// Vector store unreachable or misconfigured.
    #[error("collection error: {0}")]
    Collection(String),
    #[error("failed to index {url}: {source}")]
    Indexing {
        url: String,
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    pub fn indexing(url: impl Into<String>, source: RagError) -> Self {
        RagError::Indexing {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// The most specific error, with any `Indexing` wrappers removed.
    pub fn root(&self) -> &RagError {
        match self {
            RagError::Indexing { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors reported by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection `{0}` already exists")]
    AlreadyExists(String),
    #[error("collection `{0}` not found")]
    NotFound(String),
    #[error("vector has {actual} dimensions, collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("vector store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for RagError {
    fn from(err: StoreError) -> Self {
        RagError::Collection(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unwraps_nested_indexing() {
        let err = RagError::indexing(
            "https://example.com",
            RagError::indexing("https://example.com", RagError::EmbeddingService("500".into())),
        );
        assert!(matches!(err.root(), RagError::EmbeddingService(_)));
        assert!(err.to_string().contains("https://example.com"));
    }

    #[test]
    fn test_store_error_maps_to_collection() {
        let err: RagError = StoreError::Backend("connection refused".into()).into();
        assert!(matches!(err, RagError::Collection(_)));
    }
}
