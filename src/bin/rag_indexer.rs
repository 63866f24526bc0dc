use anyhow::Result;
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use rag_chatbot::config::Settings;
use rag_chatbot::server::AppState;

#[derive(Parser, Debug)]
#[command(name = "rag-indexer")]
#[command(about = "Index web pages into the RAG vector store")]
struct Args {
    /// URLs to fetch and index
    #[arg(required = true)]
    urls: Vec<String>,

    /// Collection name (overrides COLLECTION_NAME)
    #[arg(long, env = "COLLECTION_NAME")]
    collection: Option<String>,

    /// Maximum chunk size in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Overlap between chunks in characters
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Number of URLs indexed at once
    #[arg(short = 'j', long, default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut settings = Settings::from_env()?;
    if let Some(collection) = args.collection {
        settings.collection_name = collection;
    }
    if let Some(size) = args.chunk_size {
        settings.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        settings.chunk_overlap = overlap;
    }
    anyhow::ensure!(
        settings.chunk_overlap < settings.chunk_size,
        "--chunk-overlap must be smaller than --chunk-size"
    );

    let state = AppState::from_settings(&settings)?;
    let dim = state.indexing.ensure_collection().await?;
    println!(
        "Collection {} ready ({} dimensions)",
        settings.collection_name, dim
    );

    let pb = ProgressBar::new(args.urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut success_count = 0usize;
    let mut total_chunks = 0usize;
    let mut failed_urls: Vec<(String, String)> = Vec::new();

    let indexing = &state.indexing;
    let mut results = stream::iter(args.urls.iter())
        .map(|url| async move { (url, indexing.index_url(url).await) })
        .buffer_unordered(args.concurrency.max(1));

    while let Some((url, result)) = results.next().await {
        pb.set_message(url.clone());
        match result {
            Ok(report) => {
                success_count += 1;
                total_chunks += report.chunks_indexed;
            }
            Err(e) => {
                tracing::warn!("Failed to index {}: {}", url, e);
                failed_urls.push((url.clone(), e.root().to_string()));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("done");

    println!("\nIndexing complete!");
    println!("  URLs indexed:    {}/{}", success_count, args.urls.len());
    println!("  URLs failed:     {}", failed_urls.len());
    println!("  Total chunks:    {}", total_chunks);
    println!("  Collection:      {}", settings.collection_name);

    if !failed_urls.is_empty() {
        println!("\nFailed URLs:");
        for (url, err) in &failed_urls {
            println!("  {}: {}", url, err);
        }
    }

    Ok(())
}
