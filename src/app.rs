//! Wiring for the CLI commands.
//!
//! [`App::connect`] builds the hosted clients once; the `run_*` functions
//! are what `ragchat serve`, `ragchat rescan` and `ragchat ask` call.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ragchat_core::embedding::Embedder;
use ragchat_core::store::VectorStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::augment::Augmenter;
use crate::config::{Config, Credentials};
use crate::embedding::OpenAIEmbedder;
use crate::generate::{ChatModel, OpenAIChat};
use crate::ingest::{spawn_ingest_worker, IngestCommand, Pipeline, RescanSummary};
use crate::pinecone::PineconeStore;
use crate::server::{build_router, serve, AppState};
use crate::stats::PipelineStats;
use crate::watcher::watch_folder;

/// Connected services shared by every command.
pub struct App {
    pub config: Config,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub stats: Arc<PipelineStats>,
}

impl App {
    /// Build the embedder and resolve (or create) the vector index.
    pub async fn connect(config: Config, credentials: &Credentials) -> Result<Self> {
        let embedder = OpenAIEmbedder::new(&config.embedding, &credentials.openai_api_key)?;
        let store = PineconeStore::connect(&config.vector_store, &credentials.pinecone_api_key)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to vector index '{}'",
                    config.vector_store.index_name
                )
            })?;
        info!(
            index = %config.vector_store.index_name,
            host = %store.host(),
            model = %embedder.model_name(),
            "connected"
        );

        Ok(Self {
            config,
            embedder: Arc::new(embedder),
            store: Arc::new(store),
            stats: Arc::new(PipelineStats::new()),
        })
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.embedder.clone(),
            self.store.clone(),
            self.config.chunking.clone(),
            self.stats.clone(),
        )
    }

    pub fn augmenter(&self) -> Augmenter {
        Augmenter::new(
            self.embedder.clone(),
            self.store.clone(),
            self.config.retrieval.clone(),
            self.stats.clone(),
        )
    }
}

/// Create the upload folder (and parents) if it does not exist yet.
pub fn ensure_upload_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create upload folder: {}", dir.display()))
}

/// Rescan the upload folder, watch it, and serve HTTP until Ctrl-C.
pub async fn run_serve(config: Config, credentials: &Credentials) -> Result<()> {
    let upload_dir = config.uploads.dir.clone();
    ensure_upload_dir(&upload_dir)?;

    let chat: Arc<dyn ChatModel> = Arc::new(OpenAIChat::new(
        &config.chat,
        &credentials.openai_api_key,
    )?);
    let app = App::connect(config, credentials).await?;

    let (handle, worker) = spawn_ingest_worker(Arc::new(app.pipeline()));
    let outcome = handle
        .submit_and_wait(IngestCommand::Rescan(upload_dir.clone()))
        .await;
    if let Err(e) = outcome {
        warn!(error = %e, "startup rescan failed");
    }

    let watcher = watch_folder(&upload_dir, handle.clone())?;
    info!(folder = %upload_dir.display(), "watching for PDF changes");

    let state = AppState {
        augmenter: Arc::new(app.augmenter()),
        chat,
        ingest: handle,
        upload_dir,
        stats: app.stats.clone(),
    };
    let router = build_router(state, app.config.server.max_upload_bytes);

    let listener = TcpListener::bind(&app.config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", app.config.server.bind))?;
    serve(listener, router).await?;

    // Dropping the router and watcher releases the last handles, so the
    // worker drains its queue and exits.
    drop(watcher);
    worker.await.context("ingestion worker panicked")?;
    Ok(())
}

/// Clear the index and re-index the upload folder once.
pub async fn run_rescan(config: Config, credentials: &Credentials) -> Result<()> {
    let upload_dir = config.uploads.dir.clone();
    ensure_upload_dir(&upload_dir)?;
    let app = App::connect(config, credentials).await?;
    let pipeline = app.pipeline();

    let summary: RescanSummary = pipeline.rescan(&upload_dir).await?;

    println!("rescan {}", upload_dir.display());
    println!("  indexed: {}", summary.indexed);
    println!("  skipped (no text): {}", summary.skipped);
    println!("  failed: {}", summary.failed);
    if let Some(failure) = app.stats.snapshot().last_failure {
        println!("  last failure: {}", failure.message);
    }
    println!("ok");
    Ok(())
}

/// Answer one query from the command line.
pub async fn run_ask(config: Config, credentials: &Credentials, query: &str) -> Result<()> {
    let chat = OpenAIChat::new(&config.chat, &credentials.openai_api_key)?;
    let app = App::connect(config, credentials).await?;

    let augmented = app.augmenter().augment(query).await;
    let response = chat.generate(&augmented).await?;

    println!("--- prompt ---");
    println!("{}", augmented);
    println!();
    println!("--- response ---");
    println!("{}", response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_dir_is_created_with_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("data").join("uploads");
        ensure_upload_dir(&dir).unwrap();
        assert!(dir.is_dir());
        // Existing folder is fine.
        ensure_upload_dir(&dir).unwrap();
    }

    #[test]
    fn test_upload_dir_over_a_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("uploads");
        std::fs::write(&file, b"x").unwrap();
        let err = ensure_upload_dir(&file).unwrap_err();
        assert!(err.to_string().contains("Failed to create upload folder"));
    }
}
