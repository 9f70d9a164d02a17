//! Nearest-neighbor query issuer.
//!
//! Validates a request, hands it to the document store and checks the shape
//! of the answer: at most `limit` documents, most similar first.

use crate::query::{SearchResult, VectorSearchRequest, RECOMMENDED_CANDIDATE_RATIO};
use crate::store::DocumentStore;
use nearest_core::AppResult;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Issues nearest-neighbor queries against one store.
///
/// Holds no per-query state; concurrent searches are independent.
#[derive(Debug, Clone)]
pub struct QueryIssuer {
    store: Arc<dyn DocumentStore>,
}

impl QueryIssuer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// The store queries are sent to.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Return up to `request.limit` documents nearest to the query vector.
    ///
    /// Fails with `InvalidParameter` before touching the store when the
    /// request is malformed; `InvalidDimension` and `IndexUnavailable` come
    /// from the store.
    pub async fn search(&self, request: &VectorSearchRequest) -> AppResult<SearchResult> {
        request.validate()?;

        let span = tracing::info_span!(
            "search",
            backend = self.store.backend_name(),
            path = %request.path,
            num_candidates = request.num_candidates,
            limit = request.limit,
        );

        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &VectorSearchRequest) -> AppResult<SearchResult> {
        let start = Instant::now();

        if request.num_candidates < request.limit.saturating_mul(RECOMMENDED_CANDIDATE_RATIO) {
            tracing::debug!(
                "numCandidates {} is below {}x limit; approximate recall may suffer",
                request.num_candidates,
                RECOMMENDED_CANDIDATE_RATIO
            );
        }

        let mut hits = match self.store.nearest(request).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Search failed: {}", e);
                return Err(e);
            }
        };

        let returned = hits.len();
        hits.retain(|(_, score)| score.is_finite());
        if hits.len() < returned {
            tracing::warn!(
                "Dropped {} documents with non-finite scores",
                returned - hits.len()
            );
        }

        // Stable sort keeps the engine's order among equal scores
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(request.limit);

        let result = SearchResult::from_hits(hits);

        if result.is_empty() {
            tracing::info!("No documents matched");
        } else {
            tracing::info!(
                "Retrieved {} documents (top score: {:.3}, lowest: {:.3}) in {:.1}ms",
                result.len(),
                result.scores.first().copied().unwrap_or_default(),
                result.scores.last().copied().unwrap_or_default(),
                start.elapsed().as_secs_f64() * 1000.0
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::metric::Metric;
    use crate::store::{StoreStats, VectorIndexDefinition};
    use crate::stores::MemoryStore;
    use nearest_core::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that returns a fixed, unsorted and oversized answer.
    #[derive(Debug)]
    struct SloppyStore {
        calls: AtomicUsize,
        hits: Vec<(Document, f32)>,
    }

    impl SloppyStore {
        fn with_hits(hits: &[(&str, f32)]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                hits: hits
                    .iter()
                    .map(|(id, score)| (Document::new(*id), *score))
                    .collect(),
            }
        }
    }

    impl Default for SloppyStore {
        fn default() -> Self {
            Self::with_hits(&[("low", 0.1), ("high", 0.9), ("mid", 0.5), ("mid-twin", 0.5)])
        }
    }

    #[async_trait::async_trait]
    impl DocumentStore for SloppyStore {
        fn backend_name(&self) -> &str {
            "sloppy"
        }

        async fn vector_index(&self, _path: &str) -> AppResult<Option<VectorIndexDefinition>> {
            Ok(Some(VectorIndexDefinition::new("vector", 2, Metric::Cosine)))
        }

        async fn nearest(&self, _request: &VectorSearchRequest) -> AppResult<Vec<(Document, f32)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.hits.clone())
        }

        async fn insert_documents(&self, _documents: &[Document]) -> AppResult<usize> {
            Ok(0)
        }

        async fn stats(&self) -> AppResult<StoreStats> {
            Ok(StoreStats {
                backend: "sloppy".to_string(),
                documents: 4,
                indexes: Vec::new(),
                ann_indexes: Vec::new(),
            })
        }

        async fn reset(&self) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enforces_order_and_limit() {
        let issuer = QueryIssuer::new(Arc::new(SloppyStore::default()));
        let request = VectorSearchRequest::new(vec![1.0, 0.0])
            .with_num_candidates(10)
            .with_limit(3);

        let result = issuer.search(&request).await.unwrap();
        assert_eq!(result.ids(), vec!["high", "mid", "mid-twin"]);
        assert_eq!(result.scores, vec![0.9, 0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_non_finite_scores_do_not_break_ordering() {
        let store = SloppyStore::with_hits(&[
            ("a", 0.5),
            ("broken", f32::NAN),
            ("exact", 1.0),
            ("far", 0.2),
        ]);
        let issuer = QueryIssuer::new(Arc::new(store));
        let request = VectorSearchRequest::new(vec![1.0, 0.0])
            .with_num_candidates(10)
            .with_limit(4);

        let result = issuer.search(&request).await.unwrap();
        assert_eq!(result.ids(), vec!["exact", "a", "far"]);
        assert!(result.scores.iter().all(|s| s.is_finite()));
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_store() {
        let store = Arc::new(SloppyStore::default());
        let issuer = QueryIssuer::new(store.clone());
        let request = VectorSearchRequest::new(vec![1.0, 0.0])
            .with_num_candidates(3)
            .with_limit(5);

        let err = issuer.search(&request).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_errors_pass_through() {
        let store = MemoryStore::new().with_index(VectorIndexDefinition::new("vector", 2, Metric::Cosine));
        let issuer = QueryIssuer::new(Arc::new(store));

        let request = VectorSearchRequest::new(vec![1.0, 0.0]).with_path("summary");
        assert!(matches!(
            issuer.search(&request).await,
            Err(AppError::IndexUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty_result() {
        let store = MemoryStore::new().with_index(VectorIndexDefinition::new("vector", 2, Metric::Cosine));
        let issuer = QueryIssuer::new(Arc::new(store));

        let result = issuer.search(&VectorSearchRequest::new(vec![1.0, 0.0])).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(issuer.store().backend_name(), "memory");
    }
}
