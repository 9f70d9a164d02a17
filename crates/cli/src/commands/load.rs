//! Load command handler.
//!
//! Writes documents from a JSONL file into the configured store.

use anyhow::Context;
use clap::Args;
use nearest_core::config::AppConfig;
use nearest_search::{create_store, load_jsonl};
use std::path::PathBuf;
use std::time::Instant;

/// Load documents from a JSONL file
#[derive(Args, Debug)]
pub struct LoadCommand {
    /// JSONL file with one document per line
    #[arg(short, long)]
    pub file: PathBuf,

    /// Remove existing documents before loading
    #[arg(long)]
    pub reset: bool,

    /// Build the approximate vector index after loading
    #[arg(long)]
    pub build_index: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LoadCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing load command for {:?}", self.file);
        let start = Instant::now();

        let documents = load_jsonl(&self.file)
            .with_context(|| format!("Failed to load documents from {:?}", self.file))?;

        let store = create_store(config).await?;
        if self.reset {
            store.reset().await?;
        }

        let written = store.insert_documents(&documents).await?;
        let index_built = if self.build_index {
            store.build_ann_index().await?
        } else {
            false
        };
        let duration_secs = start.elapsed().as_secs_f64();

        if self.json {
            let output = serde_json::json!({
                "file": self.file,
                "backend": store.backend_name(),
                "documentsWritten": written,
                "reset": self.reset,
                "indexBuilt": index_built,
                "durationSecs": duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Loaded {} documents into {} in {:.2}s",
                written,
                store.backend_name(),
                duration_secs
            );
            if index_built {
                println!("Built vector index on '{}'", config.index.path);
            }
        }

        Ok(())
    }
}
