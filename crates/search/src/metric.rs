//! Similarity metrics and score normalization.
//!
//! Scores are normalized to `[0, 1]` (higher is more similar) the same way for
//! every backend, so results from the exact in-memory store and from LanceDB
//! distances compare directly.

use lancedb::DistanceType;
use nearest_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Similarity function a vector index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Angle between vectors; magnitude is ignored
    Cosine,
    /// Inner product; vectors are expected to be unit length
    DotProduct,
    /// Straight-line distance
    Euclidean,
}

impl Metric {
    /// Normalized similarity score of `a` against `b`.
    ///
    /// Vectors of different length score 0.0.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        match self {
            Metric::Cosine => (1.0 + cosine_similarity(a, b)) / 2.0,
            Metric::DotProduct => (1.0 + dot(a, b)) / 2.0,
            Metric::Euclidean => 1.0 / (1.0 + squared_l2(a, b).sqrt()),
        }
    }

    /// Normalized score from a LanceDB `_distance` value.
    ///
    /// LanceDB reports `1 - cos` for cosine, `1 - dot` for dot product and the
    /// squared L2 distance for euclidean.
    pub fn score_from_distance(&self, distance: f32) -> f32 {
        match self {
            Metric::Cosine | Metric::DotProduct => (2.0 - distance) / 2.0,
            Metric::Euclidean => 1.0 / (1.0 + distance.max(0.0).sqrt()),
        }
    }

    /// LanceDB distance type for this metric.
    pub fn distance_type(&self) -> DistanceType {
        match self {
            Metric::Cosine => DistanceType::Cosine,
            Metric::DotProduct => DistanceType::Dot,
            Metric::Euclidean => DistanceType::L2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::DotProduct => "dotProduct",
            Metric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "dotProduct" | "dot_product" | "dot" => Ok(Metric::DotProduct),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(AppError::Config(format!(
                "Unknown similarity metric: {}. Supported: cosine, dotProduct, euclidean",
                other
            ))),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Cosine similarity in `[-1, 1]`; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}
