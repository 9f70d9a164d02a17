//! Reading documents from newline-delimited JSON.

use crate::document::Document;
use nearest_core::{AppError, AppResult};
use std::path::Path;

/// Load documents from a JSONL file, one JSON object per line.
///
/// Blank lines are skipped. A malformed line fails the whole load with its
/// line number.
pub fn load_jsonl(path: &Path) -> AppResult<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {:?}: {}", path, e),
        ))
    })?;

    let documents = parse_jsonl(&content)?;
    tracing::debug!("Loaded {} documents from {:?}", documents.len(), path);
    Ok(documents)
}

/// Parse JSONL text into documents.
pub fn parse_jsonl(content: &str) -> AppResult<Vec<Document>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let value = serde_json::from_str(line)
                .map_err(|e| AppError::Serialization(format!("line {}: {}", idx + 1, e)))?;
            Document::from_value(value).map_err(|e| match e {
                AppError::Serialization(msg) => {
                    AppError::Serialization(format!("line {}: {}", idx + 1, msg))
                }
                other => other,
            })
        })
        .collect()
}
