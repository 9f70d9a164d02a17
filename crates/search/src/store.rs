//! Document store abstraction.
//!
//! The store owns the documents, the vector index and the ranking algorithm.
//! A query only describes what it wants; the store answers it.

use crate::document::Document;
use crate::metric::Metric;
use crate::query::VectorSearchRequest;
use crate::stores::{LanceDbStore, MemoryStore};
use nearest_core::{AppConfig, AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;

/// A vector index a store exposes on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorIndexDefinition {
    /// Field holding the indexed vectors
    pub path: String,

    /// Vector dimensionality
    pub dimensions: usize,

    /// Similarity metric the index ranks by
    pub metric: Metric,
}

impl VectorIndexDefinition {
    pub fn new(path: impl Into<String>, dimensions: usize, metric: Metric) -> Self {
        Self {
            path: path.into(),
            dimensions,
            metric,
        }
    }

    /// Index described by the `index` section of the config.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self::new(
            config.index.path.clone(),
            config.index.dimensions,
            config.index.metric.parse()?,
        ))
    }

    /// Check that `request` can run against this index.
    pub fn check(&self, request: &VectorSearchRequest) -> AppResult<()> {
        if request.query_vector.len() != self.dimensions {
            return Err(AppError::InvalidDimension {
                expected: self.dimensions,
                actual: request.query_vector.len(),
            });
        }
        Ok(())
    }
}

/// Resolve the index a request targets, or fail with `IndexUnavailable`.
pub(crate) fn require_index(
    index: Option<VectorIndexDefinition>,
    request: &VectorSearchRequest,
) -> AppResult<VectorIndexDefinition> {
    let index = index.ok_or_else(|| {
        AppError::IndexUnavailable(format!("no vector index on path '{}'", request.path))
    })?;
    index.check(request)?;
    Ok(index)
}

/// Snapshot of what a store holds.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Backend name
    pub backend: String,

    /// Number of stored documents
    pub documents: usize,

    /// Vector indexes available for queries
    pub indexes: Vec<VectorIndexDefinition>,

    /// Approximate (ANN) index structures built by the engine
    pub ann_indexes: Vec<String>,
}

/// Trait for document stores with a vector index.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Get backend name (e.g., "lancedb", "memory")
    fn backend_name(&self) -> &str;

    /// Describe the vector index on `path`, if there is one.
    async fn vector_index(&self, path: &str) -> AppResult<Option<VectorIndexDefinition>>;

    /// Run a nearest-neighbor search.
    ///
    /// Returns at most `request.limit` documents with their normalized
    /// scores, ordered by descending similarity. Fails with
    /// `IndexUnavailable` or `InvalidDimension` when the request does not fit
    /// the store's indexes.
    async fn nearest(&self, request: &VectorSearchRequest) -> AppResult<Vec<(Document, f32)>>;

    /// Insert documents, replacing any with the same id. Returns the count written.
    async fn insert_documents(&self, documents: &[Document]) -> AppResult<usize>;

    /// Get statistics about the store.
    async fn stats(&self) -> AppResult<StoreStats>;

    /// Remove all documents.
    async fn reset(&self) -> AppResult<()>;

    /// Build the engine's approximate index over the stored vectors.
    ///
    /// Returns false for backends that always search exactly.
    async fn build_ann_index(&self) -> AppResult<bool> {
        Ok(false)
    }
}

/// Create a document store based on configuration.
pub async fn create_store(config: &AppConfig) -> AppResult<Arc<dyn DocumentStore>> {
    let index = VectorIndexDefinition::from_config(config)?;

    match config.store.backend.as_str() {
        "lancedb" => {
            let store = LanceDbStore::connect(&config.store_uri(), &config.store.table, index).await?;
            Ok(Arc::new(store))
        }

        "memory" => Ok(Arc::new(MemoryStore::new().with_index(index))),

        other => Err(AppError::Config(format!(
            "Unknown store backend: '{}'. Supported backends: lancedb, memory",
            other
        ))),
    }
}
