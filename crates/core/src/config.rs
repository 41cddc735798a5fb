//! Configuration management for ragvault.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - A YAML config file (`--config`, `RAGVAULT_CONFIG`, or `./ragvault.yaml`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ragvault.yaml";

/// Embedding providers known to the knowledge crate.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path of the config file that was merged, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    pub logging: LoggingConfig,

    pub storage: StorageConfig,

    pub embedding: EmbeddingConfig,

    pub ingest: IngestConfig,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (e.g., "info", "ragvault_knowledge=debug")
    pub level: Option<String>,

    /// Colored output on stderr
    pub color: bool,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            color: true,
            format: LogFormat::Pretty,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Which storage backend to attempt at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Durable MatrixOne store, degrading to memory when unavailable
    Matrixone,
    /// In-process store only
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "matrixone" | "durable" => Ok(Self::Matrixone),
            "memory" | "fallback" => Ok(Self::Memory),
            other => Err(AppError::Config(format!(
                "Unknown storage backend: {}. Supported: matrixone, memory",
                other
            ))),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,

    pub matrixone: MatrixOneConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Matrixone,
            matrixone: MatrixOneConfig::default(),
        }
    }
}

/// How the durable store ranks rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMode {
    /// `cosine_similarity` evaluated by the database with ORDER BY/LIMIT
    Database,
    /// Fetch every row and rank in process
    Scan,
}

/// Connection settings for the MatrixOne durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatrixOneConfig {
    pub host: String,

    pub port: u16,

    pub user: String,

    /// Environment variable holding the password
    pub password_env: String,

    pub database: String,

    pub table: String,

    pub max_connections: u32,

    /// Bound on the initial connect and on pool acquisition
    pub connect_timeout_secs: u64,

    pub similarity: SimilarityMode,

    /// Attempt to build an IVFFLAT index on the embedding column
    pub create_index: bool,

    /// IVFFLAT list count
    pub index_lists: u32,
}

impl Default for MatrixOneConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6001,
            user: "root".to_string(),
            password_env: "RAGVAULT_DB_PASSWORD".to_string(),
            database: "ragvault".to_string(),
            table: "document_chunks".to_string(),
            max_connections: 4,
            connect_timeout_secs: 5,
            similarity: SimilarityMode::Database,
            create_index: true,
            index_lists: 1,
        }
    }
}

impl MatrixOneConfig {
    /// Resolve the password from the configured environment variable.
    ///
    /// MatrixOne's stock `root` account uses `111`, which is the fallback.
    pub fn resolve_password(&self) -> String {
        std::env::var(&self.password_env).unwrap_or_else(|_| "111".to_string())
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per embedding call during ingestion
    pub batch_size: usize,

    /// Provider base URL override
    pub endpoint: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: 32,
            endpoint: None,
        }
    }
}

/// Document discovery and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngestConfig {
    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Documents whose cleaned text is shorter than this are skipped
    pub min_content_length: usize,

    /// File extensions picked up from a directory (without the dot)
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            min_content_length: 10,
            extensions: ["txt", "md", "markdown", "html", "htm", "docx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config file and environment.
    ///
    /// Environment variables:
    /// - `RAGVAULT_CONFIG`: Path to config file
    /// - `RAGVAULT_STORAGE`: `matrixone` or `memory`
    /// - `RAGVAULT_DB_HOST`, `RAGVAULT_DB_PORT`, `RAGVAULT_DB_USER`,
    ///   `RAGVAULT_DB_NAME`, `RAGVAULT_DB_TABLE`: MatrixOne connection
    /// - `RAGVAULT_EMBEDDING_PROVIDER`, `RAGVAULT_EMBEDDING_MODEL`: embeddings
    /// - `OLLAMA_URL`: Ollama base URL
    /// - `RUST_LOG`: Log filter, read by `init_logging` when no level is set
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use ragvault_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Storage: {:?}", config.storage.backend);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("RAGVAULT_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Self::from_yaml_file(&path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_yaml_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut config: AppConfig = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.config_file = Some(path.to_path_buf());

        tracing::debug!("Loaded config file {:?}", path);
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("RAGVAULT_STORAGE") {
            self.storage.backend = backend.parse()?;
        }

        let mo = &mut self.storage.matrixone;
        if let Some(host) = lookup("RAGVAULT_DB_HOST") {
            mo.host = host;
        }
        if let Some(port) = lookup("RAGVAULT_DB_PORT") {
            mo.port = port.parse().map_err(|_| {
                AppError::Config(format!("RAGVAULT_DB_PORT is not a valid port: {}", port))
            })?;
        }
        if let Some(user) = lookup("RAGVAULT_DB_USER") {
            mo.user = user;
        }
        if let Some(database) = lookup("RAGVAULT_DB_NAME") {
            mo.database = database;
        }
        if let Some(table) = lookup("RAGVAULT_DB_TABLE") {
            mo.table = table;
        }

        if let Some(provider) = lookup("RAGVAULT_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Some(model) = lookup("RAGVAULT_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            self.embedding.endpoint = Some(url);
        }

        if lookup("NO_COLOR").is_some() {
            self.logging.color = false;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// `--log-level` wins over `--verbose`, which wins over the file's level.
    pub fn with_overrides(
        mut self,
        storage: Option<BackendKind>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(storage) = storage {
            self.storage.backend = storage;
        }

        if let Some(log_level) = log_level {
            self.logging.level = Some(log_level);
        } else if verbose {
            self.logging.level = Some("debug".to_string());
        }

        if no_color {
            self.logging.color = false;
        }

        self
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be greater than zero".to_string(),
            ));
        }

        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }

        if self.storage.matrixone.max_connections == 0 {
            return Err(AppError::Config(
                "MatrixOne maxConnections must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
