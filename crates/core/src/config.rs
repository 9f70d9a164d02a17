//! Configuration management for nearest.
//!
//! Configuration is assembled in layers, later layers winning:
//! - Built-in defaults
//! - Config file (`.nearest/config.yaml` in the workspace, or `--config`)
//! - Environment variables
//! - Command-line flags
//!
//! The similarity metric of the vector index lives here: it is a property of
//! how the stored vectors were indexed, so it is configured, never inferred.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Store backends known to the factory.
pub const KNOWN_BACKENDS: [&str; 2] = ["lancedb", "memory"];

/// Metric names accepted in `index.metric`.
pub const KNOWN_METRICS: [&str; 3] = ["cosine", "dotProduct", "euclidean"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .nearest/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Document store connection
    pub store: StoreConfig,

    /// Vector index on the stored documents
    pub index: IndexConfig,

    /// Default query parameters
    pub search: SearchDefaults,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Where documents live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name ("lancedb" or "memory")
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database URI; relative paths resolve against the workspace
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Table (collection) holding the documents
    #[serde(default = "default_table")]
    pub table: String,
}

/// Description of the vector index the store exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Field holding the stored vectors
    #[serde(default = "default_path")]
    pub path: String,

    /// Vector dimensionality
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Similarity metric the vectors were indexed with
    #[serde(default = "default_metric")]
    pub metric: String,
}

/// Default candidate budget and result size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDefaults {
    #[serde(rename = "numCandidates", default = "default_num_candidates")]
    pub num_candidates: usize,

    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_backend() -> String {
    "lancedb".to_string()
}

fn default_uri() -> String {
    ".nearest/db".to_string()
}

fn default_table() -> String {
    "documents".to_string()
}

fn default_path() -> String {
    "vector".to_string()
}

fn default_dimensions() -> usize {
    128
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_num_candidates() -> usize {
    10
}

fn default_limit() -> usize {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            uri: default_uri(),
            table: default_table(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            dimensions: default_dimensions(),
            metric: default_metric(),
        }
    }
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            num_candidates: default_num_candidates(),
            limit: default_limit(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    store: Option<StoreConfig>,
    index: Option<IndexConfig>,
    search: Option<SearchDefaults>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            store: StoreConfig::default(),
            index: IndexConfig::default(),
            search: SearchDefaults::default(),
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `NEAREST_WORKSPACE`: Override workspace path
    /// - `NEAREST_CONFIG`: Path to config file
    /// - `NEAREST_STORE_URI`: Database URI
    /// - `NEAREST_TABLE`: Table name
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with_env(|key| std::env::var(key).ok())
    }

    /// Build the layered config, reading variables through `env`.
    fn load_with_env(env: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = env("NEAREST_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = env("NEAREST_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        config.load_file()?;
        config.apply_env(&env);

        Ok(config)
    }

    /// Environment layer; sits above the config file and below CLI flags.
    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) {
        if let Some(uri) = env("NEAREST_STORE_URI") {
            self.store.uri = uri;
        }

        if let Some(table) = env("NEAREST_TABLE") {
            self.store.table = table;
        }

        if let Some(level) = env("RUST_LOG") {
            self.log_level = Some(level);
        }

        if env("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Merge the config file into this config, if one exists.
    ///
    /// An explicitly named file must exist; the workspace default is optional.
    pub fn load_file(&mut self) -> AppResult<()> {
        if !self.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                self.workspace
            )));
        }

        let config_path = match self.config_file {
            Some(ref cf) => {
                if !cf.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        cf
                    )));
                }
                cf.clone()
            }
            None => self.nearest_dir().join("config.yaml"),
        };

        if config_path.exists() {
            self.merge_yaml(&config_path)?;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(store) = config_file.store {
            self.store = store;
        }

        if let Some(index) = config_file.index {
            self.index = index;
        }

        if let Some(search) = config_file.search {
            self.search = search;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(format) = logging.format {
                self.log_format = format;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(())
    }

    /// Apply CLI overrides, giving precedence to flags over everything else.
    pub fn with_overrides(
        self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> AppResult<Self> {
        self.with_overrides_env(
            workspace,
            config_file,
            log_level,
            verbose,
            no_color,
            |key| std::env::var(key).ok(),
        )
    }

    fn with_overrides_env(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        // A different workspace or file means different lower layers; rebuild
        // them from defaults so nothing from the previous file survives.
        if workspace.is_some() || config_file.is_some() {
            let mut rebuilt = Self {
                workspace: workspace.unwrap_or(self.workspace),
                config_file: config_file.or(self.config_file),
                ..Self::default()
            };
            rebuilt.load_file()?;
            rebuilt.apply_env(&env);
            self = rebuilt;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        Ok(self)
    }

    /// Get the path to the .nearest directory.
    pub fn nearest_dir(&self) -> PathBuf {
        self.workspace.join(".nearest")
    }

    /// Ensure the .nearest directory exists.
    pub fn ensure_nearest_dir(&self) -> AppResult<()> {
        let dir = self.nearest_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .nearest directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolve the store URI; relative filesystem paths hang off the workspace.
    pub fn store_uri(&self) -> String {
        let uri = &self.store.uri;
        if uri.contains("://") || Path::new(uri).is_absolute() {
            uri.clone()
        } else {
            self.workspace.join(uri).to_string_lossy().to_string()
        }
    }

    /// Validate the assembled configuration.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_BACKENDS.contains(&self.store.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown store backend: {}. Supported: {}",
                self.store.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if self.store.table.trim().is_empty() {
            return Err(AppError::Config("store.table must not be empty".to_string()));
        }

        if self.index.path.trim().is_empty() {
            return Err(AppError::Config("index.path must not be empty".to_string()));
        }

        if self.index.dimensions == 0 {
            return Err(AppError::Config(
                "index.dimensions must be positive".to_string(),
            ));
        }

        if !KNOWN_METRICS.contains(&self.index.metric.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown similarity metric: {}. Supported: {}",
                self.index.metric,
                KNOWN_METRICS.join(", ")
            )));
        }

        if self.search.limit == 0 || self.search.num_candidates == 0 {
            return Err(AppError::Config(
                "search.limit and search.numCandidates must be positive".to_string(),
            ));
        }

        if self.search.limit > self.search.num_candidates {
            return Err(AppError::Config(format!(
                "search.limit ({}) must not exceed search.numCandidates ({})",
                self.search.limit, self.search.num_candidates
            )));
        }

        Ok(())
    }
}
