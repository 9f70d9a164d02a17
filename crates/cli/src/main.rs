//! Nearest CLI
//!
//! Issues nearest-neighbor queries against a local vector store and manages
//! the documents it holds.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{LoadCommand, SearchCommand, StatsCommand};
use nearest_core::{config::AppConfig, logging, AppError, AppResult};
use std::path::PathBuf;

/// Nearest - vector nearest-neighbor search over stored documents
#[derive(Parser, Debug)]
#[command(name = "nearest")]
#[command(about = "Vector nearest-neighbor search over stored documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "NEAREST_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "NEAREST_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the documents nearest to a query vector
    Search(SearchCommand),

    /// Load documents from a JSONL file
    Load(LoadCommand),

    /// Show store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()
        .context("Failed to load configuration")?
        .with_overrides(
            cli.workspace,
            cli.config,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        )
        .context("Failed to apply command-line overrides")?;
    config.validate()?;
    check_cli_backend(&config)?;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_format)?;

    tracing::info!("Nearest CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!(
        "Store: {} ({}), index: {} dim={} metric={}",
        config.store.backend,
        config.store_uri(),
        config.index.path,
        config.index.dimensions,
        config.index.metric
    );

    config.ensure_nearest_dir()?;

    let command_name = match &cli.command {
        Commands::Search(_) => "search",
        Commands::Load(_) => "load",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Load(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}

/// Each invocation is its own process, so the store must outlive it.
fn check_cli_backend(config: &AppConfig) -> AppResult<()> {
    if config.store.backend == "memory" {
        return Err(AppError::Config(
            "store.backend 'memory' keeps documents only for the life of one process \
             and is available to library users only; use 'lancedb' with the CLI"
                .to_string(),
        ));
    }
    Ok(())
}
