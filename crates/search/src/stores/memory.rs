//! In-process document store with exact search.
//!
//! Every indexed document is scored, so the candidate budget never limits
//! recall here. Useful for tests and for embedding small collections.

use crate::document::Document;
use crate::query::VectorSearchRequest;
use crate::store::{require_index, DocumentStore, StoreStats, VectorIndexDefinition};
use nearest_core::AppResult;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Documents keyed by id plus the vector indexes declared over them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Document>>,
    indexes: Vec<VectorIndexDefinition>,
}

impl MemoryStore {
    /// Create an empty store with no indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a vector index. A later index on the same path replaces it.
    pub fn with_index(mut self, index: VectorIndexDefinition) -> Self {
        self.indexes.retain(|existing| existing.path != index.path);
        self.indexes.push(index);
        self
    }

    /// Insert documents, replacing any with the same id.
    pub async fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> usize {
        let mut stored = self.documents.write().await;
        let mut count = 0;
        for document in documents {
            stored.insert(document.id.clone(), document);
            count += 1;
        }
        count
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn index_on(&self, path: &str) -> Option<VectorIndexDefinition> {
        self.indexes.iter().find(|index| index.path == path).cloned()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn vector_index(&self, path: &str) -> AppResult<Option<VectorIndexDefinition>> {
        Ok(self.index_on(path))
    }

    async fn nearest(&self, request: &VectorSearchRequest) -> AppResult<Vec<(Document, f32)>> {
        let index = require_index(self.index_on(&request.path), request)?;
        let documents = self.documents.read().await;

        // Documents without a usable vector at `path` are not in the index
        let mut scored: Vec<(Document, f32)> = documents
            .values()
            .filter_map(|doc| {
                let vector = doc.vector(&request.path)?;
                if vector.len() != index.dimensions {
                    return None;
                }
                let score = index.metric.score(&request.query_vector, &vector);
                // Overflowing magnitudes can still produce NaN
                score.is_finite().then(|| (doc.clone(), score))
            })
            .collect();

        let indexed = scored.len();

        // Stable sort: equal scores stay in id order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(request.limit);

        tracing::debug!(
            "Scored {} of {} documents exactly, returning {} (requested top-{})",
            indexed,
            documents.len(),
            scored.len(),
            request.limit
        );

        Ok(scored)
    }

    async fn insert_documents(&self, documents: &[Document]) -> AppResult<usize> {
        Ok(self.insert_many(documents.iter().cloned()).await)
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        Ok(StoreStats {
            backend: self.backend_name().to_string(),
            documents: self.len().await,
            indexes: self.indexes.clone(),
            ann_indexes: Vec::new(),
        })
    }

    async fn reset(&self) -> AppResult<()> {
        self.documents.write().await.clear();
        tracing::info!("Reset in-memory document store");
        Ok(())
    }
}
