mod common;

use std::sync::Arc;

use rag_chatbot::error::RagError;
use rag_chatbot::indexer::TextSplitter;
use rag_chatbot::rag::{IndexingPipeline, VectorStore};

use common::{harness, HashingEmbedder, RecordingModel, StaticLoader, COLLECTION, DIM};

const SKY_URL: &str = "https://example.com/a";
const SKY_TEXT: &str = "The sky is blue. Grass is green.";

#[tokio::test]
async fn test_index_then_answer_round_trip() {
    let h = harness(
        StaticLoader::default().with_page(SKY_URL, SKY_TEXT),
        RecordingModel::replying("- The sky is blue."),
    );

    let report = h.indexing.index_url(SKY_URL).await.unwrap();
    assert_eq!(report.chunks_indexed, 1);
    assert_eq!(h.store.inner.len(COLLECTION), 1);

    let answer = h.retrieval.answer("What color is the sky?").await.unwrap();
    assert_eq!(answer.question, "What color is the sky?");
    assert_eq!(answer.answer, "- The sky is blue.");
    assert_eq!(answer.context.len(), 1);
    assert_eq!(answer.context[0].text, SKY_TEXT);
    assert_eq!(answer.context[0].source_url(), Some(SKY_URL));
    assert_eq!(
        answer.context[0].metadata.get("title").map(String::as_str),
        Some("Test page")
    );

    let prompts = h.model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("The sky is blue."));
    assert!(prompts[0].contains("Question: What color is the sky?"));
}

#[tokio::test]
async fn test_invalid_urls_rejected_without_side_effects() {
    let h = harness(StaticLoader::default(), RecordingModel::replying("unused"));

    for url in ["", "ftp://x", "   "] {
        let err = h.indexing.index_url(url).await.unwrap_err();
        assert!(
            matches!(err, RagError::InvalidInput(_)),
            "{url:?} gave {err:?}"
        );
    }

    assert_eq!(h.embedder.calls(), 0);
    assert_eq!(h.loader.calls(), 0);
    assert_eq!(h.store.calls(), 0);
}

#[tokio::test]
async fn test_empty_page_is_content_extraction_error() {
    let h = harness(
        StaticLoader::default().with_page(SKY_URL, "  \n\n  "),
        RecordingModel::replying("unused"),
    );

    let err = h.indexing.index_url(SKY_URL).await.unwrap_err();
    match &err {
        RagError::Indexing { url, .. } => assert_eq!(url, SKY_URL),
        other => panic!("expected indexing wrapper, got {other:?}"),
    }
    assert!(matches!(err.root(), RagError::ContentExtraction(_)));
    assert!(h.store.inner.is_empty(COLLECTION));
}

#[tokio::test]
async fn test_unknown_page_fails_with_url_context() {
    let h = harness(StaticLoader::default(), RecordingModel::replying("unused"));

    let err = h.indexing.index_url("https://example.com/missing").await.unwrap_err();
    assert!(err.to_string().contains("https://example.com/missing"));
    assert!(matches!(err.root(), RagError::ContentExtraction(_)));
}

#[tokio::test]
async fn test_reindexing_appends_records() {
    let h = harness(
        StaticLoader::default().with_page(SKY_URL, SKY_TEXT),
        RecordingModel::replying("ok"),
    );

    h.indexing.index_url(SKY_URL).await.unwrap();
    h.indexing.index_url(SKY_URL).await.unwrap();
    assert_eq!(h.store.inner.len(COLLECTION), 2);
    assert_eq!(
        h.store.inner.collection_dim(COLLECTION).await.unwrap(),
        Some(DIM)
    );
}

#[tokio::test]
async fn test_equal_scores_keep_insertion_order() {
    let h = harness(
        StaticLoader::default()
            .with_page("https://example.com/first", "Identical passage about rivers.")
            .with_page("https://example.com/second", "Identical passage about rivers."),
        RecordingModel::replying("ok"),
    );

    h.indexing.index_url("https://example.com/first").await.unwrap();
    h.indexing.index_url("https://example.com/second").await.unwrap();

    for _ in 0..5 {
        let results = h.retrieval.retrieve("rivers").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        let sources: Vec<_> = results.iter().map(|r| r.chunk.source_url()).collect();
        assert_eq!(
            sources,
            vec![Some("https://example.com/first"), Some("https://example.com/second")]
        );
    }
}

#[tokio::test]
async fn test_retrieval_respects_top_k() {
    let text = (0..12)
        .map(|i| format!("Paragraph number {i} talks about topic {i}."))
        .collect::<Vec<_>>()
        .join("\n\n");
    let loader = Arc::new(StaticLoader::default().with_page(SKY_URL, &text));
    let embedder = Arc::new(HashingEmbedder::default());
    let store = Arc::new(common::CountingStore::default());

    let indexing = IndexingPipeline::new(
        loader,
        TextSplitter::new(60, 5),
        embedder.clone(),
        store.clone(),
        COLLECTION,
    );
    let report = indexing.index_url(SKY_URL).await.unwrap();
    assert!(report.chunks_indexed > 4);

    let retrieval = rag_chatbot::rag::RetrievalPipeline::new(
        embedder,
        store,
        Arc::new(RecordingModel::replying("ok")),
        COLLECTION,
    );
    let results = retrieval.retrieve("topic 3").await.unwrap();
    assert_eq!(results.len(), 4);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let h = harness(StaticLoader::default(), RecordingModel::replying("unused"));

    let err = h.retrieval.answer("   ").await.unwrap_err();
    assert!(matches!(err, RagError::InvalidInput(_)));
    assert_eq!(h.embedder.calls(), 0);
}

#[tokio::test]
async fn test_model_failure_is_generation_error() {
    let h = harness(
        StaticLoader::default().with_page(SKY_URL, SKY_TEXT),
        RecordingModel::failing(),
    );
    h.indexing.index_url(SKY_URL).await.unwrap();

    let err = h.retrieval.answer("What color is the sky?").await.unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert_eq!(h.model.prompts().len(), 1);
}

#[tokio::test]
async fn test_answer_without_collection_is_collection_error() {
    let h = harness(StaticLoader::default(), RecordingModel::replying("unused"));

    let err = h.retrieval.answer("anything?").await.unwrap_err();
    assert!(matches!(err, RagError::Collection(_)));
    assert!(h.model.prompts().is_empty());
}
