//! Documents as the store hands them back.

use nearest_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record owned by the document store.
///
/// Apart from `id`, fields are opaque to the query except the one named by
/// the request's `path`, which holds the stored vector as a JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Every other stored field
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Set a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Store `vector` under the top-level field `path`.
    pub fn with_vector(self, path: impl Into<String>, vector: &[f32]) -> Self {
        let values: Vec<Value> = vector.iter().map(|v| Value::from(f64::from(*v))).collect();
        self.with_field(path, Value::Array(values))
    }

    /// Look up a field; dotted paths walk into nested objects.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// The numeric vector stored at `path`.
    ///
    /// `None` if the field is missing, is not an array, or holds anything
    /// other than numbers representable as finite `f32`.
    pub fn vector(&self, path: &str) -> Option<Vec<f32>> {
        self.field(path)?
            .as_array()?
            .iter()
            .map(|v| {
                let value = v.as_f64()? as f32;
                value.is_finite().then_some(value)
            })
            .collect()
    }

    /// Build a document from a JSON object.
    ///
    /// The identifier is taken from `id` (or `_id`) and may be a string or a
    /// number; it is removed from the remaining fields.
    pub fn from_value(value: Value) -> AppResult<Self> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(AppError::Serialization(format!(
                    "Document must be a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let raw_id = fields
            .remove("id")
            .or_else(|| fields.remove("_id"))
            .ok_or_else(|| AppError::Serialization("Document is missing an id".to_string()))?;

        let id = match raw_id {
            Value::String(s) if !s.is_empty() => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(AppError::Serialization(format!(
                    "Document id must be a non-empty string or a number, got {}",
                    json_type_name(&other)
                )))
            }
        };

        Ok(Self { id, fields })
    }

    /// The fields without the one at `path` (top-level only).
    pub fn fields_without(&self, path: &str) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        fields.remove(path);
        fields
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vector_roundtrip_through_fields() {
        let doc = Document::new("d1").with_vector("vector", &[0.5, -1.0, 2.0]);
        assert_eq!(doc.vector("vector"), Some(vec![0.5, -1.0, 2.0]));
        assert_eq!(doc.vector("missing"), None);
    }

    #[test]
    fn test_vector_rejects_non_numeric() {
        let doc = Document::new("d1").with_field("vector", json!([1.0, "two", 3.0]));
        assert_eq!(doc.vector("vector"), None);

        let doc = Document::new("d2").with_field("vector", json!("not an array"));
        assert_eq!(doc.vector("vector"), None);
    }

    #[test]
    fn test_vector_rejects_values_outside_f32() {
        let doc = Document::new("d1").with_field("vector", json!([1e39, 1e39]));
        assert_eq!(doc.vector("vector"), None);

        let doc = Document::new("d2").with_field("vector", json!([-1e39, 0.0]));
        assert_eq!(doc.vector("vector"), None);
    }

    #[test]
    fn test_dotted_path_lookup() {
        let doc = Document::new("d1").with_field("embeddings", json!({ "title": [1.0, 0.0] }));
        assert_eq!(doc.vector("embeddings.title"), Some(vec![1.0, 0.0]));
        assert_eq!(doc.vector("embeddings.body"), None);
    }

    #[test]
    fn test_from_value_with_numeric_id() {
        let doc = Document::from_value(json!({ "_id": 42, "title": "hello" })).unwrap();
        assert_eq!(doc.id, "42");
        assert_eq!(doc.fields.get("title"), Some(&json!("hello")));
        assert!(!doc.fields.contains_key("_id"));
    }

    #[test]
    fn test_from_value_errors() {
        assert!(Document::from_value(json!([1, 2, 3])).is_err());
        assert!(Document::from_value(json!({ "title": "no id" })).is_err());
        assert!(Document::from_value(json!({ "id": "" })).is_err());
        assert!(Document::from_value(json!({ "id": null })).is_err());
    }

    #[test]
    fn test_serialize_flattens_fields() {
        let doc = Document::new("d1").with_field("title", "hello");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({ "id": "d1", "title": "hello" }));
    }
}
