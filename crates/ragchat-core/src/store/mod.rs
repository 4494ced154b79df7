//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the boundary between the pipeline and the
//! external vector index. The ingestion pipeline is its only writer; prompt
//! augmentation only calls [`VectorStore::query`].
//!
//! Every operation returns a typed [`StoreError`]. Callers decide whether a
//! failure is fatal; the pipeline logs and contains them.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorStore::upsert) | Insert or replace records by id |
//! | [`query`](VectorStore::query) | Top-k nearest records, descending score |
//! | [`delete`](VectorStore::delete) | Remove one record; absent ids are not an error |
//! | [`delete_document`](VectorStore::delete_document) | Remove every record of one document |
//! | [`delete_all`](VectorStore::delete_all) | Empty the collection |

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{QueryMatch, VectorRecord};

/// Failure talking to the vector index.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("vector store request failed: {0}")]
    Request(String),
    /// The index answered with a non-success status.
    #[error("vector store API error {status}: {body}")]
    Api { status: u16, body: String },
    /// The response body could not be interpreted.
    #[error("invalid vector store response: {0}")]
    InvalidResponse(String),
    /// A vector's length does not match the index dimension.
    #[error("dimension mismatch: index expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Abstract vector index.
///
/// Implementations must be `Send + Sync`; one instance is shared between
/// the ingestion worker and request handlers.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace each record at its id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError>;

    /// Return up to `top_k` records nearest to `vector`, best first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError>;

    /// Remove the record with this id. Removing an absent id succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Remove every record whose parent document is `document_id`.
    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError>;

    /// Remove every record in the collection.
    async fn delete_all(&self) -> Result<(), StoreError>;
}
