//! Retrieval-augmented question answering over indexed web pages.
//!
//! Indexing: fetch a URL, split its text, embed the chunks and store them in a
//! vector collection. Answering: embed the question, fetch the nearest chunks
//! and ask a chat model to answer from them.

pub mod config;
pub mod error;
pub mod indexer;
pub mod llm;
pub mod models;
pub mod rag;
pub mod server;

pub use error::{RagError, StoreError};
