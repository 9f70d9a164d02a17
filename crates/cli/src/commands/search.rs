//! Search command handler.
//!
//! Reads a query vector, issues one nearest-neighbor query and prints the
//! documents in rank order.

use anyhow::Context;
use clap::Args;
use nearest_core::config::AppConfig;
use nearest_search::query::parse_query_vector;
use nearest_search::{create_store, QueryIssuer, SearchResult, VectorSearchRequest};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Find the documents nearest to a query vector
#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("query").required(true).args(["vector", "vector_file"]))]
pub struct SearchCommand {
    /// Query vector as a JSON array, e.g. "[0.1, 0.2, 0.3]"
    #[arg(long)]
    pub vector: Option<String>,

    /// File holding the query vector (JSON array or {"queryVector": [...]})
    #[arg(long)]
    pub vector_file: Option<PathBuf>,

    /// Indexed field to search (default from config)
    #[arg(long)]
    pub path: Option<String>,

    /// Candidates the index considers before ranking (default from config)
    #[arg(long)]
    pub num_candidates: Option<usize>,

    /// Maximum documents to return (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Include similarity scores in the output
    #[arg(long)]
    pub with_score: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing search command");

        let request = self.build_request(config)?;
        tracing::debug!(
            "Query: dim={} path={} numCandidates={} limit={}",
            request.query_vector.len(),
            request.path,
            request.num_candidates,
            request.limit
        );

        let store = create_store(config).await?;
        let issuer = QueryIssuer::new(store);
        let result = issuer.search(&request).await?;

        if self.json {
            let output = json!({
                "path": request.path,
                "numCandidates": request.num_candidates,
                "limit": request.limit,
                "documents": render_documents(&result, self.with_score),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if result.is_empty() {
            println!("No documents found");
        } else {
            for (rank, (document, score)) in result.iter().enumerate() {
                let fields = Value::Object(document.fields_without(&request.path));
                if self.with_score {
                    println!("{}. {} [{:.4}] {}", rank + 1, document.id, score, fields);
                } else {
                    println!("{}. {} {}", rank + 1, document.id, fields);
                }
            }
        }

        Ok(())
    }

    fn build_request(&self, config: &AppConfig) -> anyhow::Result<VectorSearchRequest> {
        let text = match (&self.vector, &self.vector_file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read query vector from {:?}", path))?,
            (None, None) => anyhow::bail!("Either --vector or --vector-file is required"),
        };

        let mut request =
            VectorSearchRequest::with_config_defaults(parse_query_vector(&text)?, config);
        if let Some(path) = &self.path {
            request = request.with_path(path.clone());
        }
        if let Some(num_candidates) = self.num_candidates {
            request = request.with_num_candidates(num_candidates);
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        Ok(request)
    }
}

/// Documents with their stored fields, plus `score` when requested.
fn render_documents(result: &SearchResult, with_score: bool) -> Vec<Value> {
    result
        .iter()
        .map(|(document, score)| {
            let mut value = json!({ "id": document.id });
            if let Value::Object(map) = &mut value {
                map.extend(document.fields.clone());
                if with_score {
                    map.insert("score".to_string(), json!(score));
                }
            }
            value
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearest_search::Document;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn command(vector: Option<&str>, vector_file: Option<PathBuf>) -> SearchCommand {
        SearchCommand {
            vector: vector.map(String::from),
            vector_file,
            path: None,
            num_candidates: None,
            limit: None,
            with_score: false,
            json: false,
        }
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let config = AppConfig::default();
        let request = command(Some("[1.0, 2.0]"), None).build_request(&config).unwrap();

        assert_eq!(request.query_vector, vec![1.0, 2.0]);
        assert_eq!(request.path, config.index.path);
        assert_eq!(request.num_candidates, config.search.num_candidates);
        assert_eq!(request.limit, config.search.limit);
    }

    #[test]
    fn test_request_flags_override_defaults() {
        let mut cmd = command(Some("[1.0]"), None);
        cmd.path = Some("title_vector".to_string());
        cmd.num_candidates = Some(100);
        cmd.limit = Some(7);

        let request = cmd.build_request(&AppConfig::default()).unwrap();
        assert_eq!(request.path, "title_vector");
        assert_eq!(request.num_candidates, 100);
        assert_eq!(request.limit, 7);
    }

    #[test]
    fn test_request_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"queryVector": [0.5, -0.5]}}"#).unwrap();

        let request = command(None, Some(file.path().to_path_buf()))
            .build_request(&AppConfig::default())
            .unwrap();
        assert_eq!(request.query_vector, vec![0.5, -0.5]);

        let missing = command(None, Some(PathBuf::from("/no/such/query.json")));
        let err = missing.build_request(&AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Failed to read query vector"));
    }

    #[test]
    fn test_render_documents_projects_score() {
        let result = SearchResult::from_hits(vec![(
            Document::new("a").with_field("title", "First"),
            0.75,
        )]);

        let plain = render_documents(&result, false);
        assert_eq!(plain[0], json!({"id": "a", "title": "First"}));

        let scored = render_documents(&result, true);
        assert_eq!(scored[0]["score"], json!(0.75));
    }
}
