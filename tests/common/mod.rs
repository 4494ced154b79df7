//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ragchat::config::ChunkingConfig;
use ragchat::ingest::Pipeline;
use ragchat::stats::PipelineStats;
use ragchat_core::embedding::{Embedder, EmbeddingError};
use ragchat_core::store::memory::InMemoryStore;

pub const DIMS: usize = 256;

/// Single-page PDF whose only text is `text`, laid out so pdf-extract can
/// parse it. `text` must not contain parentheses or backslashes.
pub fn pdf_with_text(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

pub fn write_pdf(path: &Path, text: &str) {
    std::fs::write(path, pdf_with_text(text)).unwrap();
}

/// Deterministic bag-of-words embedder: each lower-cased alphanumeric word
/// is hashed into one of [`DIMS`] buckets. Texts sharing words score
/// higher under cosine similarity.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub stats: Arc<PipelineStats>,
    pub pipeline: Arc<Pipeline>,
}

pub fn fixture(max_tokens: usize) -> Fixture {
    let store = Arc::new(InMemoryStore::with_dims(DIMS));
    let stats = Arc::new(PipelineStats::new());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(HashEmbedder),
        store.clone(),
        ChunkingConfig { max_tokens },
        stats.clone(),
    ));
    Fixture {
        store,
        stats,
        pipeline,
    }
}
