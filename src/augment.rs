//! Prompt augmentation.
//!
//! Turns a user query into the prompt sent to the chat model. Greetings
//! short-circuit to a fixed instruction. Everything else is embedded, the
//! top-k nearest records are fetched, and their text is framed around the
//! question. Retrieval is fail-open: if anything goes wrong, or nothing
//! matches, the raw query is used as the prompt.

use std::sync::Arc;

use ragchat_core::embedding::Embedder;
use ragchat_core::prompt::{augmented_prompt, build_context, is_greeting, GREETING_INSTRUCTION};
use ragchat_core::store::VectorStore;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::stats::{FailureClass, PipelineStats};

pub struct Augmenter {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    retrieval: RetrievalConfig,
    stats: Arc<PipelineStats>,
}

impl Augmenter {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        retrieval: RetrievalConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            embedder,
            store,
            retrieval,
            stats,
        }
    }

    pub async fn augment(&self, query: &str) -> String {
        if is_greeting(query, &self.retrieval.greetings) {
            return GREETING_INSTRUCTION.to_string();
        }

        let vector = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed, using raw query");
                self.stats.record_failure(FailureClass::Embedding, e.to_string());
                return query.to_string();
            }
        };

        let matches = match self.store.query(&vector, self.retrieval.top_k).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "vector query failed, using raw query");
                self.stats.record_failure(FailureClass::Store, e.to_string());
                return query.to_string();
            }
        };

        if matches.is_empty() {
            debug!("no matches, using raw query");
            return query.to_string();
        }

        debug!(
            matches = matches.len(),
            top = %matches[0].metadata.filename,
            "retrieved context"
        );
        self.stats.record_augmented();
        augmented_prompt(&build_context(&matches), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::embedding::EmbeddingError;
    use ragchat_core::models::{QueryMatch, VectorRecord};
    use ragchat_core::store::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Request("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingStore {
        queries: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VectorStore for CountingStore {
        async fn upsert(&self, _records: &[VectorRecord]) -> Result<(), StoreError> {
            Ok(())
        }
        async fn query(&self, _v: &[f32], _k: usize) -> Result<Vec<QueryMatch>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Request("unreachable".to_string()))
        }
        async fn delete(&self, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_document(&self, _id: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete_all(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_greeting_skips_retrieval() {
        let store = Arc::new(CountingStore::default());
        let aug = Augmenter::new(
            Arc::new(FailingEmbedder),
            store.clone(),
            RetrievalConfig::default(),
            Arc::new(PipelineStats::new()),
        );
        assert_eq!(aug.augment("Hello").await, GREETING_INSTRUCTION);
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_returns_raw_query() {
        let stats = Arc::new(PipelineStats::new());
        let aug = Augmenter::new(
            Arc::new(FailingEmbedder),
            Arc::new(CountingStore::default()),
            RetrievalConfig::default(),
            stats.clone(),
        );
        assert_eq!(aug.augment("refund policy").await, "refund policy");
        assert_eq!(stats.snapshot().failures.embedding, 1);
    }
}
