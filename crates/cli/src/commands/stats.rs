//! Stats command handler.

use clap::Args;
use nearest_core::config::AppConfig;
use nearest_search::create_store;

/// Show store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing stats command");

        let store = create_store(config).await?;
        let stats = store.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Backend: {}", stats.backend);
        println!("Documents: {}", stats.documents);
        if stats.indexes.is_empty() {
            println!("Vector indexes: (none)");
        } else {
            println!("Vector indexes:");
            for index in &stats.indexes {
                println!("- {} ({} dim, {})", index.path, index.dimensions, index.metric);
            }
        }
        if !stats.ann_indexes.is_empty() {
            println!("ANN indexes:");
            for name in &stats.ann_indexes {
                println!("- {}", name);
            }
        }

        Ok(())
    }
}
