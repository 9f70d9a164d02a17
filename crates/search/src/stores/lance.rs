//! LanceDB-backed document store.
//!
//! Documents live in one table with three columns: `id`, the vector column
//! named by the configured index path, and `fields` (the remaining fields as
//! a JSON string). Queries go to LanceDB's vector search; its `_distance`
//! output is converted to the normalized score.

use crate::document::Document;
use crate::metric::Metric;
use crate::query::VectorSearchRequest;
use crate::store::{require_index, DocumentStore, StoreStats, VectorIndexDefinition};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use futures::TryStreamExt;
use lancedb::index::vector::IvfHnswSqIndexBuilder;
use lancedb::index::Index;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use nearest_core::{AppError, AppResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

const ID_COLUMN: &str = "id";
const FIELDS_COLUMN: &str = "fields";
const DISTANCE_COLUMN: &str = "_distance";

/// LanceDB table of documents with one configured vector column.
pub struct LanceDbStore {
    connection: Connection,
    table_name: String,
    index: VectorIndexDefinition,
    table: RwLock<Option<Table>>,
}

impl std::fmt::Debug for LanceDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbStore")
            .field("table_name", &self.table_name)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl LanceDbStore {
    /// Connect to the database at `uri`. The table is opened lazily and
    /// created by the first insert.
    ///
    /// # Arguments
    /// * `uri` - Local directory or object-store URI of the database
    /// * `table_name` - Table holding the documents
    /// * `index` - Vector column written on insert, and the metric queries rank by
    pub async fn connect(
        uri: &str,
        table_name: &str,
        index: VectorIndexDefinition,
    ) -> AppResult<Self> {
        if index.path == ID_COLUMN || index.path == FIELDS_COLUMN {
            return Err(AppError::Config(format!(
                "Vector path '{}' collides with a reserved column",
                index.path
            )));
        }

        if !uri.contains("://") {
            std::fs::create_dir_all(uri).map_err(|e| {
                AppError::Store(format!("Failed to create database directory: {}", e))
            })?;
        }

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        tracing::debug!("Connected to LanceDB at {} (table '{}')", uri, table_name);

        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            index,
            table: RwLock::new(None),
        })
    }

    /// Open the documents table, if it exists.
    async fn table(&self) -> AppResult<Option<Table>> {
        if let Some(table) = self.table.read().await.as_ref() {
            return Ok(Some(table.clone()));
        }

        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(self.table_name.as_str())
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to open table: {}", e)))?;

        *self.table.write().await = Some(table.clone());
        Ok(Some(table))
    }

    /// Arrow schema of the documents table.
    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new(
                self.index.path.as_str(),
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.index.dimensions as i32,
                ),
                false,
            ),
            Field::new(FIELDS_COLUMN, DataType::Utf8, false),
        ]))
    }

    /// Vector columns in `schema`, each described with the configured metric.
    ///
    /// Only `Float32` lists count; results are decoded as `Float32Array`.
    fn vector_columns(&self, schema: &Schema) -> Vec<VectorIndexDefinition> {
        schema
            .fields()
            .iter()
            .filter_map(|field| match field.data_type() {
                DataType::FixedSizeList(item, size) if item.data_type() == &DataType::Float32 => {
                    Some(VectorIndexDefinition::new(
                        field.name().as_str(),
                        *size as usize,
                        self.index.metric,
                    ))
                }
                _ => None,
            })
            .collect()
    }

    async fn read_schema(table: &Table) -> AppResult<SchemaRef> {
        table
            .schema()
            .await
            .map_err(|e| AppError::Store(format!("Failed to read table schema: {}", e)))
    }

    /// The vector column named `path`, if the table has one.
    async fn vector_column(
        &self,
        table: &Table,
        path: &str,
    ) -> AppResult<Option<VectorIndexDefinition>> {
        let schema = Self::read_schema(table).await?;
        Ok(self
            .vector_columns(&schema)
            .into_iter()
            .find(|index| index.path == path))
    }

    /// Convert documents to a RecordBatch.
    fn documents_to_batch(&self, documents: &[Document]) -> AppResult<RecordBatch> {
        let path = self.index.path.as_str();
        let dimensions = self.index.dimensions;

        let mut ids = Vec::with_capacity(documents.len());
        let mut values = Vec::with_capacity(documents.len() * dimensions);
        let mut fields = Vec::with_capacity(documents.len());

        for document in documents {
            let vector = document.vector(path).ok_or_else(|| {
                AppError::InvalidParameter(format!(
                    "Document '{}' has no finite numeric vector at '{}'",
                    document.id, path
                ))
            })?;

            if vector.len() != dimensions {
                return Err(AppError::InvalidDimension {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }

            ids.push(document.id.as_str());
            values.extend(vector);
            fields.push(serde_json::to_string(&document.fields_without(path))?);
        }

        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimensions as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Store(format!("Failed to build vector column: {}", e)))?;

        RecordBatch::try_new(
            self.create_schema(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(vectors),
                Arc::new(StringArray::from(fields)),
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Convert a search result batch into scored documents.
    fn batch_to_hits(
        &self,
        batch: &RecordBatch,
        path: &str,
        metric: Metric,
    ) -> AppResult<Vec<(Document, f32)>> {
        let ids = string_column(batch, ID_COLUMN)?;
        let fields = string_column(batch, FIELDS_COLUMN)?;

        let vectors = batch
            .column_by_name(path)
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::Store(format!("Invalid vector column '{}'", path)))?;

        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| AppError::Store("Search result has no distance column".to_string()))?;

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let mut document_fields: Map<String, Value> = serde_json::from_str(fields.value(row))
                .map_err(|e| AppError::Store(format!("Failed to parse stored fields: {}", e)))?;

            let vector_ref = vectors.value(row);
            let vector = vector_ref
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| AppError::Store("Invalid vector values".to_string()))?;

            document_fields.insert(
                path.to_string(),
                Value::Array(
                    vector
                        .values()
                        .iter()
                        .map(|v| Value::from(f64::from(*v)))
                        .collect(),
                ),
            );

            let document = Document {
                id: ids.value(row).to_string(),
                fields: document_fields,
            };
            hits.push((document, metric.score_from_distance(distances.value(row))));
        }

        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Store(format!("Invalid {} column", name)))
}

#[async_trait::async_trait]
impl DocumentStore for LanceDbStore {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn vector_index(&self, path: &str) -> AppResult<Option<VectorIndexDefinition>> {
        let Some(table) = self.table().await? else {
            return Ok(None);
        };
        self.vector_column(&table, path).await
    }

    async fn nearest(&self, request: &VectorSearchRequest) -> AppResult<Vec<(Document, f32)>> {
        let table = self.table().await?.ok_or_else(|| {
            AppError::IndexUnavailable(format!(
                "table '{}' does not exist; load documents first",
                self.table_name
            ))
        })?;

        let index = require_index(self.vector_column(&table, &request.path).await?, request)?;

        let batches: Vec<RecordBatch> = table
            .query()
            .nearest_to(request.query_vector.clone())
            .map_err(|e| AppError::Store(format!("Failed to create query: {}", e)))?
            .column(&request.path)
            .distance_type(index.metric.distance_type())
            .ef(request.num_candidates)
            .limit(request.limit)
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Store(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(self.batch_to_hits(batch, &request.path, index.metric)?);
        }

        hits.retain(|(_, score)| score.is_finite());
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(request.limit);

        tracing::debug!(
            "LanceDB returned {} documents in {} batches (requested top-{}, ef={})",
            hits.len(),
            batches.len(),
            request.limit,
            request.num_candidates
        );

        Ok(hits)
    }

    async fn insert_documents(&self, documents: &[Document]) -> AppResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let batch = self.documents_to_batch(documents)?;
        let schema = batch.schema();

        match self.table().await? {
            Some(table) => {
                let mut merge = table.merge_insert(&[ID_COLUMN]);
                merge
                    .when_matched_update_all(None)
                    .when_not_matched_insert_all();
                merge
                    .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
                    .await
                    .map_err(|e| AppError::Store(format!("Failed to upsert documents: {}", e)))?;
            }
            None => {
                let table = self
                    .connection
                    .create_table(
                        self.table_name.as_str(),
                        RecordBatchIterator::new(vec![Ok(batch)], schema),
                    )
                    .execute()
                    .await
                    .map_err(|e| AppError::Store(format!("Failed to create table: {}", e)))?;

                tracing::info!("Created LanceDB table '{}'", self.table_name);
                *self.table.write().await = Some(table);
            }
        }

        tracing::debug!("Wrote {} documents into LanceDB", documents.len());
        Ok(documents.len())
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let Some(table) = self.table().await? else {
            return Ok(StoreStats {
                backend: self.backend_name().to_string(),
                documents: 0,
                indexes: Vec::new(),
                ann_indexes: Vec::new(),
            });
        };

        let documents = table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Store(format!("Failed to count rows: {}", e)))?;

        let schema = Self::read_schema(&table).await?;

        let ann_indexes = table
            .list_indices()
            .await
            .map_err(|e| AppError::Store(format!("Failed to list indices: {}", e)))?
            .into_iter()
            .map(|index| {
                format!(
                    "{} ({:?} on {})",
                    index.name,
                    index.index_type,
                    index.columns.join(", ")
                )
            })
            .collect();

        Ok(StoreStats {
            backend: self.backend_name().to_string(),
            documents,
            indexes: self.vector_columns(&schema),
            ann_indexes,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        if let Some(table) = self.table().await? {
            table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Store(format!("Failed to reset table: {}", e)))?;
        }

        tracing::info!("Reset LanceDB table '{}'", self.table_name);
        Ok(())
    }

    async fn build_ann_index(&self) -> AppResult<bool> {
        let table = self.table().await?.ok_or_else(|| {
            AppError::IndexUnavailable(format!(
                "table '{}' does not exist; load documents first",
                self.table_name
            ))
        })?;

        let builder = IvfHnswSqIndexBuilder::default().distance_type(self.index.metric.distance_type());

        table
            .create_index(&[self.index.path.as_str()], Index::IvfHnswSq(builder))
            .execute()
            .await
            .map_err(|e| AppError::Store(format!("Failed to build vector index: {}", e)))?;

        tracing::info!(
            "Built IVF_HNSW_SQ index on '{}' ({})",
            self.index.path,
            self.index.metric
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(temp: &TempDir, metric: Metric) -> LanceDbStore {
        let uri = temp.path().join("db");
        LanceDbStore::connect(
            &uri.to_string_lossy(),
            "documents",
            VectorIndexDefinition::new("vector", 4, metric),
        )
        .await
        .unwrap()
    }

    fn sample_documents() -> Vec<Document> {
        vec![
            Document::new("rust")
                .with_vector("vector", &[1.0, 0.0, 0.0, 0.0])
                .with_field("title", "Rust ownership"),
            Document::new("go")
                .with_vector("vector", &[0.7, 0.7, 0.0, 0.0])
                .with_field("title", "Go channels"),
            Document::new("pasta")
                .with_vector("vector", &[0.0, 0.0, 0.0, 1.0])
                .with_field("title", "Cooking pasta"),
        ]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_orders_by_similarity() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;
        assert_eq!(store.insert_documents(&sample_documents()).await.unwrap(), 3);

        let request = VectorSearchRequest::new(vec![1.0, 0.1, 0.0, 0.0])
            .with_num_candidates(10)
            .with_limit(2);
        let hits = store.nearest(&request).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.id, "rust");
        assert_eq!(hits[1].0.id, "go");
        assert!(hits[0].1 >= hits[1].1);
        assert_eq!(hits[0].0.fields.get("title"), Some(&Value::from("Rust ownership")));
        assert_eq!(hits[0].0.vector("vector"), Some(vec![1.0, 0.0, 0.0, 0.0]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_euclidean_identical_vector_scores_one() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Euclidean).await;
        store.insert_documents(&sample_documents()).await.unwrap();

        let request = VectorSearchRequest::new(vec![0.0, 0.0, 0.0, 1.0]).with_limit(1);
        let hits = store.nearest(&request).await.unwrap();
        assert_eq!(hits[0].0.id, "pasta");
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_table_is_index_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;

        let request = VectorSearchRequest::new(vec![1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(
            store.nearest(&request).await,
            Err(AppError::IndexUnavailable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_non_vector_path_is_index_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;
        store.insert_documents(&sample_documents()).await.unwrap();

        for path in ["title", "fields", "missing"] {
            let request = VectorSearchRequest::new(vec![1.0, 0.0, 0.0, 0.0]).with_path(path);
            assert!(matches!(
                store.nearest(&request).await,
                Err(AppError::IndexUnavailable(_))
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_only_float32_lists_are_vector_columns() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;

        let list_of = |item: DataType| {
            DataType::FixedSizeList(Arc::new(Field::new("item", item, true)), 4)
        };
        let schema = Schema::new(vec![
            Field::new(ID_COLUMN, DataType::Utf8, false),
            Field::new("vector", list_of(DataType::Float32), false),
            Field::new("half", list_of(DataType::Float16), false),
            Field::new("double", list_of(DataType::Float64), false),
            Field::new(FIELDS_COLUMN, DataType::Utf8, false),
        ]);

        assert_eq!(
            store.vector_columns(&schema),
            vec![VectorIndexDefinition::new("vector", 4, Metric::Cosine)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;
        store.insert_documents(&sample_documents()).await.unwrap();

        let request = VectorSearchRequest::new(vec![1.0, 0.0]);
        assert!(matches!(
            store.nearest(&request).await,
            Err(AppError::InvalidDimension {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_rejects_bad_vectors() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;

        let missing = vec![Document::new("x").with_field("title", "no vector")];
        assert!(matches!(
            store.insert_documents(&missing).await,
            Err(AppError::InvalidParameter(_))
        ));

        let huge =
            vec![Document::new("x").with_field("vector", serde_json::json!([1e39, 0.0, 0.0, 0.0]))];
        assert!(matches!(
            store.insert_documents(&huge).await,
            Err(AppError::InvalidParameter(_))
        ));

        let short = vec![Document::new("x").with_vector("vector", &[1.0, 0.0])];
        assert!(matches!(
            store.insert_documents(&short).await,
            Err(AppError::InvalidDimension { .. })
        ));
    }

    /// Deterministic spread of `count` vectors with `dimensions` components.
    fn wave_documents(count: usize, dimensions: usize) -> Vec<Document> {
        (0..count)
            .map(|i| {
                let vector: Vec<f32> = (0..dimensions)
                    .map(|j| ((i * 31 + j * 7) as f32 * 0.1).sin())
                    .collect();
                Document::new(format!("doc-{:04}", i))
                    .with_vector("vector", &vector)
                    .with_field("rank", i as u64)
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_through_built_ann_index() {
        let temp = TempDir::new().unwrap();
        let store = LanceDbStore::connect(
            &temp.path().join("db").to_string_lossy(),
            "documents",
            VectorIndexDefinition::new("vector", 16, Metric::Cosine),
        )
        .await
        .unwrap();

        let documents = wave_documents(512, 16);
        store.insert_documents(&documents).await.unwrap();
        assert!(store.build_ann_index().await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.documents, 512);
        assert!(!stats.ann_indexes.is_empty());
        assert!(stats.ann_indexes.iter().any(|name| name.contains("vector")));

        let query = documents[42].vector("vector").unwrap();
        let request = VectorSearchRequest::new(query)
            .with_num_candidates(64)
            .with_limit(5);
        let hits = store.nearest(&request).await.unwrap();

        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_build_ann_index_without_table() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;
        assert!(matches!(
            store.build_ann_index().await,
            Err(AppError::IndexUnavailable(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stats_upsert_and_reset() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp, Metric::Cosine).await;

        let empty = store.stats().await.unwrap();
        assert_eq!(empty.documents, 0);
        assert!(empty.indexes.is_empty());

        store.insert_documents(&sample_documents()).await.unwrap();
        store
            .insert_documents(&[Document::new("rust")
                .with_vector("vector", &[0.9, 0.1, 0.0, 0.0])
                .with_field("title", "Rust lifetimes")])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.backend, "lancedb");
        assert_eq!(stats.documents, 3);
        assert_eq!(
            stats.indexes,
            vec![VectorIndexDefinition::new("vector", 4, Metric::Cosine)]
        );

        store.reset().await.unwrap();
        assert_eq!(store.stats().await.unwrap().documents, 0);
    }
}
