//! In-memory [`VectorStore`] implementation for tests and offline runs.
//!
//! Records live in a `BTreeMap` behind `std::sync::RwLock`, so iteration
//! order (and therefore tie ordering in queries) is deterministic. Query is
//! brute-force cosine similarity over every stored vector.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{QueryMatch, VectorRecord};

use super::{StoreError, VectorStore};

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, VectorRecord>>,
    dims: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects vectors whose length is not `dims`, the way a
    /// hosted index with a fixed dimension does.
    pub fn with_dims(dims: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            dims: Some(dims),
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All record ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn check_dims(&self, len: usize) -> Result<(), StoreError> {
        match self.dims {
            Some(expected) if expected != len => Err(StoreError::DimensionMismatch {
                expected,
                got: len,
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        for r in records {
            self.check_dims(r.values.len())?;
        }
        let mut stored = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for r in records {
            stored.insert(r.id.clone(), r.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, StoreError> {
        self.check_dims(vector.len())?;
        let stored = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches: Vec<QueryMatch> = stored
            .values()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();
        // Stable sort keeps id order among equal scores.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, r| r.metadata.document_id != document_id);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
