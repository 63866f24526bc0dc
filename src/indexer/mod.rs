pub mod chunker;
pub mod loader;

pub use chunker::TextSplitter;
pub use loader::{DocumentLoader, WebLoader};
