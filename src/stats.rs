//! Pipeline counters.
//!
//! Failures in ingestion, augmentation and generation are contained
//! (logged, then skipped), so these counters are how an operator sees that
//! something went wrong. A snapshot is served at `GET /api/stats` and
//! printed by `ragchat rescan`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which component a contained failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Extraction,
    Embedding,
    Store,
    Generation,
}

/// Shared counters plus the most recent failure.
#[derive(Default)]
pub struct PipelineStats {
    documents_indexed: AtomicU64,
    records_upserted: AtomicU64,
    documents_removed: AtomicU64,
    documents_skipped: AtomicU64,
    queries_augmented: AtomicU64,
    extraction_failures: AtomicU64,
    embedding_failures: AtomicU64,
    store_failures: AtomicU64,
    generation_failures: AtomicU64,
    last_failure: Mutex<Option<FailureRecord>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureRecord {
    pub class: FailureClass,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct FailureCounts {
    pub extraction: u64,
    pub embedding: u64,
    pub store: u64,
    pub generation: u64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub documents_indexed: u64,
    pub records_upserted: u64,
    pub documents_removed: u64,
    pub documents_skipped: u64,
    pub queries_augmented: u64,
    pub failures: FailureCounts,
    pub last_failure: Option<FailureRecord>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_indexed(&self, records: usize) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.records_upserted
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.documents_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// A PDF with no extractable text.
    pub fn record_skipped(&self) {
        self.documents_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A query that went through retrieval and came back with context.
    pub fn record_augmented(&self) {
        self.queries_augmented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, class: FailureClass, message: impl Into<String>) {
        let counter = match class {
            FailureClass::Extraction => &self.extraction_failures,
            FailureClass::Embedding => &self.embedding_failures,
            FailureClass::Store => &self.store_failures,
            FailureClass::Generation => &self.generation_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let mut slot = self
            .last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(FailureRecord {
            class,
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            records_upserted: self.records_upserted.load(Ordering::Relaxed),
            documents_removed: self.documents_removed.load(Ordering::Relaxed),
            documents_skipped: self.documents_skipped.load(Ordering::Relaxed),
            queries_augmented: self.queries_augmented.load(Ordering::Relaxed),
            failures: FailureCounts {
                extraction: self.extraction_failures.load(Ordering::Relaxed),
                embedding: self.embedding_failures.load(Ordering::Relaxed),
                store: self.store_failures.load(Ordering::Relaxed),
                generation: self.generation_failures.load(Ordering::Relaxed),
            },
            last_failure: self
                .last_failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}
