use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use rag_chatbot::config::Settings;
use rag_chatbot::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    tracing::info!("Vector backend: {:?}", settings.vector_backend);
    tracing::info!("Connecting to Qdrant: {}", settings.qdrant_url);
    tracing::info!("Embedding model: {}", settings.embedding_model);
    tracing::info!("Chat model: {}", settings.llm_model);

    let state = Arc::new(AppState::from_settings(&settings)?);

    // The collection must exist before the first request arrives.
    state
        .indexing
        .ensure_collection()
        .await
        .with_context(|| format!("Failed to prepare collection {}", settings.collection_name))?;

    let origins = settings.allowed_origins();
    tracing::info!("Allowed origins: {}", origins.join(", "));
    let app = server::router(state, &origins);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port)).await?;
    tracing::info!("Backend server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
