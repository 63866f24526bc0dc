use crate::error::RagError;
use crate::models::{Chunk, RawDocument};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Break points, tried from coarsest to finest.
const SEPARATORS: [&str; 10] = ["\n\n", "\n", ". ", "? ", "! ", "。", "？", "！", "; ", " "];

/// Recursive character splitter with a fixed overlap between neighbours.
///
/// Sizes are measured in characters, not bytes.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits every document, keeping reading order and copying each
    /// document's metadata onto its chunks.
    ///
    /// Returns `ContentExtraction` when no document has any text left after
    /// trimming, rather than an empty list.
    pub fn split(&self, documents: &[RawDocument]) -> Result<Vec<Chunk>, RagError> {
        let mut chunks = Vec::new();
        for doc in documents {
            for (index, text) in self.split_text(&doc.content).into_iter().enumerate() {
                let mut metadata = doc.metadata.clone();
                metadata.insert("chunk_index".to_string(), index.to_string());
                chunks.push(Chunk { text, metadata });
            }
        }

        if chunks.is_empty() {
            let source = documents
                .iter()
                .find_map(|d| d.metadata.get("source"))
                .map(String::as_str)
                .unwrap_or("document");
            return Err(RagError::ContentExtraction(format!(
                "No content could be split from {}. The page may be empty.",
                source
            )));
        }
        Ok(chunks)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let max_end = start + self.chunk_size;
            if max_end >= chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }

            let end = self.find_break_point(&chars, start, max_end);
            chunks.push(chars[start..end].iter().collect());
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Rightmost separator end in `chars[start..max_end]` that still leaves
    /// room for the overlap, falling back to a hard cut at `max_end`.
    fn find_break_point(&self, chars: &[char], start: usize, max_end: usize) -> usize {
        let window: String = chars[start..max_end].iter().collect();
        let min_end = start + self.chunk_overlap;

        for sep in SEPARATORS {
            if let Some(pos) = window.rfind(sep) {
                let end = start + window[..pos].chars().count() + sep.chars().count();
                if end > min_end {
                    return end;
                }
            }
        }
        max_end
    }
}
