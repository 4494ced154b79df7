//! Splitting extracted document text into vector records.
//!
//! Two modes, selected by `max_tokens`:
//!
//! - `0` keeps the whole document as one [`Chunk`] whose id is the
//!   document id. Retrieval is then per-document, and very large documents
//!   may exceed the embedding model's input limit.
//! - `> 0` splits on paragraph boundaries (`\n\n`) so that each chunk stays
//!   under `max_tokens`. Chunk ids are `{document_id}-{index}`.
//!
//! # Algorithm (paragraph mode)
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Accumulate trimmed paragraphs into a buffer until adding the next one
//!    would exceed `max_chars`, then flush.
//! 3. A single paragraph longer than `max_chars` is hard-split at the
//!    nearest newline or space before the limit.
//! 4. At least one chunk is produced for every document.
//!
//! ```rust
//! use ragchat_core::chunk::split_document;
//!
//! let chunks = split_document("doc", "Hello world.\n\nSecond paragraph.", 0);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].id, "doc");
//! ```

use crate::models::Chunk;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split a document into chunks. `max_tokens == 0` disables splitting.
pub fn split_document(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    if max_tokens == 0 {
        return vec![Chunk {
            id: document_id.to_string(),
            document_id: document_id.to_string(),
            chunk_index: 0,
            text: text.to_string(),
        }];
    }
    chunk_text(document_id, text, max_tokens)
}

/// Split text into chunks on paragraph boundaries, respecting `max_tokens`.
/// Returns chunks with contiguous indices starting at 0.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            push_chunk(&mut chunks, document_id, &current_buf);
            current_buf.clear();
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, max_chars);
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    push_chunk(&mut chunks, document_id, piece);
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        push_chunk(&mut chunks, document_id, &current_buf);
    }

    if chunks.is_empty() {
        push_chunk(&mut chunks, document_id, text.trim());
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, document_id: &str, text: &str) {
    let index = chunks.len();
    chunks.push(Chunk {
        id: format!("{}-{}", document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
    });
}

/// Largest char boundary in `s` that is `<= max` (and `> 0` when `s` is
/// non-empty), so slicing never splits a UTF-8 sequence.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        // max is smaller than the first character; take that character whole.
        s.chars().next().map(char::len_utf8).unwrap_or(s.len())
    } else {
        idx
    }
}
