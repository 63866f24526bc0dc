pub mod collection;
pub mod embeddings;
pub mod index_pipeline;
pub mod retrieval;
pub mod vector_store;

pub use collection::CollectionManager;
pub use embeddings::{Embedder, RemoteEmbeddingClient};
pub use index_pipeline::IndexingPipeline;
pub use retrieval::RetrievalPipeline;
pub use vector_store::{InMemoryStore, QdrantStore, VectorStore};
