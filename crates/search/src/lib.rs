//! Nearest-neighbor queries against a document store.
//!
//! A query names a stored vector field (`path`), a candidate budget
//! (`num_candidates`) and a result bound (`limit`). The store's own vector
//! index does the ranking; this crate validates the request, delegates it and
//! enforces the shape of the answer.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nearest_search::{Document, MemoryStore, Metric, QueryIssuer, VectorIndexDefinition, VectorSearchRequest};
//!
//! # async fn demo() -> nearest_core::AppResult<()> {
//! let store = MemoryStore::new().with_index(VectorIndexDefinition::new("vector", 3, Metric::Cosine));
//! store.insert_many(vec![Document::new("a").with_vector("vector", &[1.0, 0.0, 0.0])]).await;
//!
//! let issuer = QueryIssuer::new(Arc::new(store));
//! let request = VectorSearchRequest::new(vec![1.0, 0.0, 0.0])
//!     .with_num_candidates(10)
//!     .with_limit(5);
//! let result = issuer.search(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod issuer;
pub mod loader;
pub mod metric;
pub mod query;
pub mod store;
pub mod stores;


// Re-export commonly used types
pub use document::Document;
pub use issuer::QueryIssuer;
pub use loader::load_jsonl;
pub use metric::Metric;
pub use query::{SearchResult, VectorSearchRequest, MAX_NUM_CANDIDATES};
pub use store::{create_store, DocumentStore, StoreStats, VectorIndexDefinition};
pub use stores::{LanceDbStore, MemoryStore};
