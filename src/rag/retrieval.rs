use std::sync::Arc;

use crate::error::RagError;
use crate::llm::{ChatModel, DEFAULT_TEMPERATURE};
use crate::models::{Message, QueryAnswer, RetrievalResult, ScoredChunk};
use super::embeddings::Embedder;
use super::vector_store::VectorStore;

pub const DEFAULT_TOP_K: usize = 4;

/// Fills the answer prompt with retrieved context and the question.
pub fn render_prompt(context: &[ScoredChunk], question: &str) -> String {
    let context = context
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "\nAnswer the question based on the context provided, in a concise and clear manner using bullet points.\n\nContext: {context}\nQuestion: {question}\nAnswer:\n"
    )
}

/// Question → similar chunks → prompt → model answer.
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    collection_name: String,
    top_k: usize,
    temperature: f32,
}

impl RetrievalPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            collection_name: collection_name.into(),
            top_k: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The `top_k` chunks most similar to `question`, best first.
    ///
    /// Equal scores keep insertion order: the earlier-indexed chunk wins.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult, RagError> {
        let query_vector = self.embedder.embed_one(question).await?;
        let results = self
            .store
            .search(&self.collection_name, &query_vector, self.top_k)
            .await?;
        tracing::debug!("Retrieved {} chunks for question", results.len());
        Ok(results)
    }

    pub async fn answer(&self, question: &str) -> Result<QueryAnswer, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("Question cannot be empty".to_string()));
        }

        let retrieved = self.retrieve(question).await?;
        let prompt = render_prompt(&retrieved, question);

        let answer = self
            .model
            .complete(vec![Message::user(prompt)], self.temperature)
            .await?;

        Ok(QueryAnswer {
            question: question.to_string(),
            answer,
            context: retrieved.into_iter().map(|scored| scored.chunk).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Metadata};

    #[test]
    fn test_render_prompt_substitutes_context_and_question() {
        let context = vec![
            ScoredChunk {
                chunk: Chunk {
                    text: "The sky is blue.".to_string(),
                    metadata: Metadata::new(),
                },
                score: 0.9,
            },
            ScoredChunk {
                chunk: Chunk {
                    text: "Grass is green.".to_string(),
                    metadata: Metadata::new(),
                },
                score: 0.5,
            },
        ];
        let prompt = render_prompt(&context, "What color is the sky?");
        assert!(prompt.contains("Context: The sky is blue.\n\nGrass is green.\n"));
        assert!(prompt.contains("Question: What color is the sky?\n"));
        assert!(prompt.trim_end().ends_with("Answer:"));
        assert!(!prompt.contains("{context}"));
    }
}
