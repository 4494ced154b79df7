//! Core data types shared by the ingestion and retrieval paths.
//!
//! A [`VectorRecord`] is what the ingestion pipeline writes to the vector
//! store; a [`QueryMatch`] is what a similarity query hands back. Both carry
//! the same [`RecordMetadata`] payload, which is stored alongside the vector
//! in the external index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest when deriving a
/// document id (64 bits).
pub const DOCUMENT_ID_HEX_LEN: usize = 16;

/// Derive the stable identifier of a document from its file name.
///
/// The id is the first [`DOCUMENT_ID_HEX_LEN`] hex characters of the
/// SHA-256 digest of the file name. Because the watched folder is flat,
/// the file name identifies the file within it. The same name always maps
/// to the same id, across processes and restarts.
///
/// ```rust
/// use ragchat_core::models::document_id;
///
/// let id = document_id("handbook.pdf");
/// assert_eq!(id.len(), 16);
/// assert_eq!(id, document_id("handbook.pdf"));
/// ```
pub fn document_id(file_name: &str) -> String {
    let digest = Sha256::digest(file_name.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(DOCUMENT_ID_HEX_LEN);
    hex
}

/// Metadata payload stored with every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Extracted text this vector was computed from.
    pub text: String,
    /// Original file name of the source document.
    pub filename: String,
    /// Id of the parent document. Equal to the record id when the document
    /// is stored as a single record.
    pub document_id: String,
}

/// A vector plus its metadata, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// One result of a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    /// Similarity score reported by the index (cosine: higher is closer).
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// A slice of a document's text that becomes one vector record.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Record id: the document id itself, or `{document_id}-{index}`.
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
}
