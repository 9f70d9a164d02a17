//! The nearest-neighbor request and its result.

use crate::document::Document;
use nearest_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on the candidate budget a store is asked to examine.
pub const MAX_NUM_CANDIDATES: usize = 10_000;

/// Candidate budget per requested result below which recall tends to suffer.
pub const RECOMMENDED_CANDIDATE_RATIO: usize = 10;

/// A single approximate nearest-neighbor query.
///
/// Serializes to the wire shape stores expect:
/// `{ "queryVector": [...], "path": "vector", "numCandidates": 10, "limit": 5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchRequest {
    /// Embedding to search for
    pub query_vector: Vec<f32>,

    /// Field holding the stored vectors
    pub path: String,

    /// Index entries the engine examines before ranking
    pub num_candidates: usize,

    /// Maximum number of documents returned
    pub limit: usize,
}

impl VectorSearchRequest {
    /// Request against the `vector` field with 10 candidates and 5 results.
    pub fn new(query_vector: Vec<f32>) -> Self {
        Self {
            query_vector,
            path: "vector".to_string(),
            num_candidates: 10,
            limit: 5,
        }
    }

    /// Request using the configured index path and search defaults.
    pub fn with_config_defaults(query_vector: Vec<f32>, config: &AppConfig) -> Self {
        Self {
            query_vector,
            path: config.index.path.clone(),
            num_candidates: config.search.num_candidates,
            limit: config.search.limit,
        }
    }

    /// Target a different vector field
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the candidate budget
    pub fn with_num_candidates(mut self, num_candidates: usize) -> Self {
        self.num_candidates = num_candidates;
        self
    }

    /// Set the result bound
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check the request shape.
    ///
    /// Dimensionality and index existence depend on the store and are checked
    /// there.
    pub fn validate(&self) -> AppResult<()> {
        if self.query_vector.is_empty() {
            return Err(AppError::InvalidParameter(
                "queryVector must not be empty".to_string(),
            ));
        }

        if let Some(pos) = self.query_vector.iter().position(|v| !v.is_finite()) {
            return Err(AppError::InvalidParameter(format!(
                "queryVector[{}] is not a finite number",
                pos
            )));
        }

        if self.path.trim().is_empty() {
            return Err(AppError::InvalidParameter("path must not be empty".to_string()));
        }

        if self.num_candidates == 0 {
            return Err(AppError::InvalidParameter(
                "numCandidates must be positive".to_string(),
            ));
        }

        if self.limit == 0 {
            return Err(AppError::InvalidParameter("limit must be positive".to_string()));
        }

        if self.num_candidates > MAX_NUM_CANDIDATES {
            return Err(AppError::InvalidParameter(format!(
                "numCandidates ({}) must not exceed {}",
                self.num_candidates, MAX_NUM_CANDIDATES
            )));
        }

        if self.limit > self.num_candidates {
            return Err(AppError::InvalidParameter(format!(
                "limit ({}) must not exceed numCandidates ({})",
                self.limit, self.num_candidates
            )));
        }

        Ok(())
    }
}

/// Parse a query embedding from JSON text.
///
/// Accepts a bare array (`[0.1, 0.2]`) or an object carrying the array under
/// `queryVector` or `vector`.
pub fn parse_query_vector(text: &str) -> AppResult<Vec<f32>> {
    let value: Value = serde_json::from_str(text.trim())?;

    let array = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("queryVector")
            .or_else(|| map.get("vector"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AppError::InvalidParameter(
                    "Expected a `queryVector` or `vector` array in the query object".to_string(),
                )
            })?,
        _ => {
            return Err(AppError::InvalidParameter(
                "Query vector must be a JSON array of numbers".to_string(),
            ))
        }
    };

    array
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                AppError::InvalidParameter(format!("queryVector[{}] is not a number", i))
            })
        })
        .collect()
}

/// Documents returned by a query, most similar first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Retrieved documents (sorted by descending similarity)
    pub documents: Vec<Document>,

    /// Normalized similarity scores, parallel to `documents`
    pub scores: Vec<f32>,
}

impl SearchResult {
    /// Build from `(document, score)` pairs already in rank order.
    pub fn from_hits(hits: Vec<(Document, f32)>) -> Self {
        let (documents, scores) = hits.into_iter().unzip();
        Self { documents, scores }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate `(document, score)` pairs in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (&Document, f32)> {
        self.documents.iter().zip(self.scores.iter().copied())
    }

    /// Document ids in rank order.
    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.id.as_str()).collect()
    }
}
