//! Ingestion pipeline.
//!
//! Keeps the vector index in step with the PDFs in the watched folder:
//! extract → chunk → embed → upsert on add, delete on remove, delete then
//! add on modify, and clear-then-reindex on rescan.
//!
//! # Single writer
//!
//! Every write goes through one worker task fed by an unbounded channel
//! ([`spawn_ingest_worker`]). The folder watcher and the upload handler
//! both submit [`IngestCommand`]s through a cloneable [`IngestHandle`], so
//! index writes are applied in submission order. Reads (chat queries) go
//! straight to the store and may observe a document mid-update.
//!
//! # Failure containment
//!
//! A failing file never stops the pipeline. Each failure is logged,
//! counted in [`PipelineStats`] by class, and returned to the submitter
//! (if it is waiting) as an [`IngestError`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragchat_core::chunk::split_document;
use ragchat_core::embedding::{Embedder, EmbeddingError};
use ragchat_core::models::{document_id, RecordMetadata, VectorRecord};
use ragchat_core::store::{StoreError, VectorStore};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::extract::{extract_pdf, is_pdf_path, ExtractError};
use crate::stats::{FailureClass, PipelineStats};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{file}: {source}")]
    Extract {
        file: String,
        #[source]
        source: ExtractError,
    },
    #[error("{file}: {source}")]
    Embedding {
        file: String,
        #[source]
        source: EmbeddingError,
    },
    #[error("{file}: {source}")]
    Store {
        file: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to read folder {path}: {message}")]
    Folder { path: String, message: String },
    #[error("ingestion worker has stopped")]
    WorkerStopped,
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IngestOutcome {
    Indexed { document_id: String, records: usize },
    Removed { document_id: String },
    /// A PDF with no extractable text.
    Skipped { file: String },
    /// Not a PDF, or a directory.
    Ignored,
    Rescanned(RescanSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RescanSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Writes documents into the vector store.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            stats,
        }
    }

    pub async fn run(&self, command: &IngestCommand) -> Result<IngestOutcome, IngestError> {
        match command {
            IngestCommand::Add(path) => self.add(path).await,
            IngestCommand::Remove(path) => self.remove(path).await,
            IngestCommand::Modify(path) => self.modify(path).await,
            IngestCommand::Rescan(dir) => self.rescan(dir).await.map(IngestOutcome::Rescanned),
        }
    }

    /// Extract, embed and upsert one PDF under its file-name-derived id.
    /// With chunking on, the document's previous chunks are deleted first.
    pub async fn add(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        let Some(file) = pdf_file_name(path) else {
            return Ok(IngestOutcome::Ignored);
        };

        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract_pdf(&owned))
            .await
            .unwrap_or_else(|e| Err(ExtractError::Pdf(e.to_string())))
            .map_err(|source| {
                self.fail(
                    FailureClass::Extraction,
                    IngestError::Extract {
                        file: file.clone(),
                        source,
                    },
                )
            })?;

        if text.trim().is_empty() {
            info!(file = %file, "no extractable text, skipping");
            self.stats.record_skipped();
            return Ok(IngestOutcome::Skipped { file });
        }

        let doc_id = document_id(&file);
        let chunks = split_document(&doc_id, &text, self.chunking.max_tokens);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = self.embedder.embed(&texts).await.map_err(|source| {
            self.fail(
                FailureClass::Embedding,
                IngestError::Embedding {
                    file: file.clone(),
                    source,
                },
            )
        })?;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.id,
                values,
                metadata: RecordMetadata {
                    text: chunk.text,
                    filename: file.clone(),
                    document_id: chunk.document_id,
                },
            })
            .collect();

        // A shorter new version must not leave higher-numbered chunks behind.
        if self.chunking.is_enabled() {
            self.store.delete_document(&doc_id).await.map_err(|source| {
                self.fail(
                    FailureClass::Store,
                    IngestError::Store {
                        file: file.clone(),
                        source,
                    },
                )
            })?;
        }

        self.store.upsert(&records).await.map_err(|source| {
            self.fail(
                FailureClass::Store,
                IngestError::Store {
                    file: file.clone(),
                    source,
                },
            )
        })?;

        info!(file = %file, document_id = %doc_id, records = records.len(), "indexed");
        self.stats.record_indexed(records.len());
        Ok(IngestOutcome::Indexed {
            document_id: doc_id,
            records: records.len(),
        })
    }

    /// Delete every record of the PDF at `path`. The file itself is
    /// usually already gone.
    pub async fn remove(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        let Some(file) = pdf_file_name(path) else {
            return Ok(IngestOutcome::Ignored);
        };
        let doc_id = document_id(&file);

        let result = if self.chunking.is_enabled() {
            self.store.delete_document(&doc_id).await
        } else {
            self.store.delete(&doc_id).await
        };
        result.map_err(|source| {
            self.fail(
                FailureClass::Store,
                IngestError::Store {
                    file: file.clone(),
                    source,
                },
            )
        })?;

        info!(file = %file, document_id = %doc_id, "removed");
        self.stats.record_removed();
        Ok(IngestOutcome::Removed {
            document_id: doc_id,
        })
    }

    /// Delete then re-add. A failed delete is logged and the add still runs.
    pub async fn modify(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        if pdf_file_name(path).is_none() {
            return Ok(IngestOutcome::Ignored);
        }
        if let Err(e) = self.remove(path).await {
            debug!(error = %e, "delete before re-add failed");
        }
        self.add(path).await
    }

    /// Clear the store, then add every PDF directly inside `dir`.
    pub async fn rescan(&self, dir: &Path) -> Result<RescanSummary, IngestError> {
        let files = list_pdfs(dir)?;

        if let Err(source) = self.store.delete_all().await {
            self.fail(
                FailureClass::Store,
                IngestError::Store {
                    file: dir.display().to_string(),
                    source,
                },
            );
        }

        let mut summary = RescanSummary::default();
        for path in &files {
            match self.add(path).await {
                Ok(IngestOutcome::Indexed { .. }) => summary.indexed += 1,
                Ok(IngestOutcome::Skipped { .. }) => summary.skipped += 1,
                Ok(_) => {}
                Err(_) => summary.failed += 1,
            }
        }

        info!(
            folder = %dir.display(),
            indexed = summary.indexed,
            skipped = summary.skipped,
            failed = summary.failed,
            "rescan complete"
        );
        Ok(summary)
    }

    fn fail(&self, class: FailureClass, err: IngestError) -> IngestError {
        warn!(error = %err, "ingestion failed");
        self.stats.record_failure(class, err.to_string());
        err
    }
}

/// The final path component of a `.pdf` path, or `None` for anything the
/// pipeline should ignore.
fn pdf_file_name(path: &Path) -> Option<String> {
    if !is_pdf_path(path) {
        return None;
    }
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// PDF files directly inside `dir`, sorted by name.
fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| IngestError::Folder {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_pdf_path(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// A write request for the ingestion worker.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestCommand {
    Add(PathBuf),
    Remove(PathBuf),
    Modify(PathBuf),
    Rescan(PathBuf),
}

struct Job {
    command: IngestCommand,
    reply: Option<oneshot::Sender<Result<IngestOutcome, IngestError>>>,
}

/// Cloneable sender side of the ingestion worker.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl IngestHandle {
    /// Queue a command without waiting for it. Usable from non-async
    /// contexts such as the watcher callback.
    pub fn submit(&self, command: IngestCommand) -> Result<(), IngestError> {
        self.tx
            .send(Job {
                command,
                reply: None,
            })
            .map_err(|_| IngestError::WorkerStopped)
    }

    /// Queue a command and wait for its result.
    pub async fn submit_and_wait(
        &self,
        command: IngestCommand,
    ) -> Result<IngestOutcome, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                command,
                reply: Some(reply),
            })
            .map_err(|_| IngestError::WorkerStopped)?;
        rx.await.map_err(|_| IngestError::WorkerStopped)?
    }
}

/// Start the single writer. The worker exits after every handle has been
/// dropped and the queue is drained.
pub fn spawn_ingest_worker(pipeline: Arc<Pipeline>) -> (IngestHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    let task = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            debug!(command = ?job.command, "ingest");
            let result = pipeline.run(&job.command).await;
            if let Some(reply) = job.reply {
                let _ = reply.send(result);
            }
        }
        debug!("ingestion worker stopped");
    });

    (IngestHandle { tx }, task)
}
