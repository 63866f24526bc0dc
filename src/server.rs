use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Settings, VectorBackend};
use crate::error::RagError;
use crate::indexer::{TextSplitter, WebLoader};
use crate::llm::ChatCompletionClient;
use crate::models::{AnswerResponse, ChatQuery, IndexQuery, IndexResponse};
use crate::rag::{
    Embedder, InMemoryStore, IndexingPipeline, QdrantStore, RemoteEmbeddingClient,
    RetrievalPipeline, VectorStore,
};

/// Shared, immutable pipelines handed to every request.
pub struct AppState {
    pub indexing: IndexingPipeline,
    pub retrieval: RetrievalPipeline,
}

impl AppState {
    pub fn new(indexing: IndexingPipeline, retrieval: RetrievalPipeline) -> Self {
        Self {
            indexing,
            retrieval,
        }
    }

    /// Builds the real clients described by `settings`. Makes no network calls.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbeddingClient::new(
            &settings.openrouter_api_key,
            &settings.embedding_base_url,
            &settings.embedding_model,
            settings.embedding_batch_size,
            settings.embedding_timeout(),
        )?);

        let store: Arc<dyn VectorStore> = match settings.vector_backend {
            VectorBackend::Qdrant => Arc::new(QdrantStore::new(
                &settings.qdrant_url,
                settings.qdrant_api_key.clone(),
            )?),
            VectorBackend::Memory => {
                tracing::warn!("Using in-memory vector store; indexed data is lost on exit");
                Arc::new(InMemoryStore::new())
            }
        };

        let model = Arc::new(ChatCompletionClient::new(
            &settings.llm_base_url,
            &settings.openrouter_api_key,
            &settings.llm_model,
        )?);

        let indexing = IndexingPipeline::new(
            Arc::new(WebLoader::new()?),
            TextSplitter::new(settings.chunk_size, settings.chunk_overlap),
            embedder.clone(),
            store.clone(),
            settings.collection_name.clone(),
        );
        let retrieval = RetrievalPipeline::new(embedder, store, model, settings.collection_name.clone())
            .with_top_k(settings.top_k)
            .with_temperature(settings.llm_temperature);

        Ok(Self::new(indexing, retrieval))
    }
}

/// Error response that never carries upstream error text.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn indexing(err: RagError) -> Self {
        let mut api = Self::from(err);
        if api.status != StatusCode::BAD_REQUEST {
            api.message = format!("Error indexing website: {}", api.message);
        }
        api
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let (status, message) = match err.root() {
            RagError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            RagError::ContentExtraction(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            RagError::EmbeddingService(_) => (
                StatusCode::BAD_GATEWAY,
                "The embedding service is unavailable. Please try again later.".to_string(),
            ),
            RagError::Generation(_) => (
                StatusCode::BAD_GATEWAY,
                "The language model could not produce an answer. Please try again later.".to_string(),
            ),
            RagError::Collection(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The vector store is unavailable. Please try again later.".to_string(),
            ),
            RagError::Indexing { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .route("/", get(server_status))
        .route("/chat", post(chat_handler))
        .route("/indexing", post(indexing_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn server_status() -> Json<serde_json::Value> {
    Json(json!({ "message": "Server is live" }))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let answer = state.retrieval.answer(&query.message).await.map_err(|e| {
        tracing::error!("Chat error: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(answer.into()))
}

async fn indexing_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<IndexResponse>, ApiError> {
    let report = state.indexing.index_url(&query.url).await.map_err(|e| {
        tracing::error!("Error indexing website: {}", e);
        ApiError::indexing(e)
    })?;

    Ok(Json(IndexResponse {
        message: "Website indexed successfully".to_string(),
        chunks_indexed: report.chunks_indexed,
    }))
}
