//! Configuration management for ragdoll
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Which vector store holds the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded SQLite file next to the config
    #[default]
    Sqlite,
    /// External Qdrant server
    Qdrant,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Qdrant connection URL (qdrant backend only)
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Environment variable name for Qdrant API key
    #[serde(default = "default_qdrant_api_key_env")]
    pub qdrant_api_key_env: String,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

/// Which service produces embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama HTTP API
    #[default]
    Ollama,
    /// In-process fastembed model (feature `local-embed`)
    Fastembed,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Service base URL (ollama backend only)
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Service base URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Model identifier
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Maximum wait for one answer, in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_max_chars")]
    pub max_chars: usize,

    /// Overlap characters between chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap_chars: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_query_top_k")]
    pub top_k: usize,

    /// Excerpt length shown for each source
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for ragdoll state
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to the SQLite vector index
    pub index_file: PathBuf,
}

impl PathsConfig {
    fn for_base(base: PathBuf) -> Self {
        Self {
            config_file: base.join("config.toml"),
            index_file: base.join("index.db"),
            base_dir: base,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            chunk: ChunkConfig::default(),
            query: QueryConfig::default(),
            paths: PathsConfig::for_base(Self::default_base_dir()),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection_name: default_collection_name(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key_env: default_qdrant_api_key_env(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            url: default_ollama_url(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: default_chunk_max_chars(),
            overlap_chars: default_chunk_overlap(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_query_top_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl Config {
    /// Get the default base directory for ragdoll (~/.ragdoll)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ragdoll")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Defaults rooted at a specific base directory
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            paths: PathsConfig::for_base(base_dir),
            ..Self::default()
        }
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            index_file: base.join("index.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);

        if path.exists() {
            return Self::load(&path);
        }

        debug!("No config file at {:?}, using defaults", path);
        let base = path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_base_dir);
        let mut config = Self::with_base_dir(base);
        config.paths.config_file = path;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the Qdrant API key from environment
    pub fn qdrant_api_key(&self) -> Option<String> {
        std::env::var(&self.store.qdrant_api_key_env).ok()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.max_chars == 0 {
            return Err(Error::Config("chunk.max_chars must be > 0".to_string()));
        }

        if self.chunk.overlap_chars >= self.chunk.max_chars {
            return Err(Error::Config(
                "chunk.overlap_chars must be < chunk.max_chars".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be > 0".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be > 0".to_string(),
            ));
        }

        if self.query.top_k == 0 {
            return Err(Error::Config("query.top_k must be >= 1".to_string()));
        }

        if self.query.preview_chars == 0 {
            return Err(Error::Config(
                "query.preview_chars must be > 0".to_string(),
            ));
        }

        if self.embedding.timeout_secs == 0
            || self.generation.timeout_secs == 0
            || self.store.timeout_secs == 0
        {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }

        if self.embedding.max_retries > MAX_RETRIES || self.generation.max_retries > MAX_RETRIES {
            return Err(Error::Config(format!(
                "max_retries must be <= {}",
                MAX_RETRIES
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.collection_name, "documents");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.chunk.max_chars, 1024);
        assert_eq!(config.chunk.overlap_chars, 200);
        assert_eq!(config.query.top_k, 5);
        assert_eq!(config.generation.timeout_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_base_dir(tmp.path().to_path_buf());
        config.store.collection_name = "test_collection".to_string();
        config.store.backend = StoreBackend::Qdrant;
        config.data_dir = tmp.path().join("docs");

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.store.collection_name, "test_collection");
        assert_eq!(loaded.store.backend, StoreBackend::Qdrant);
        assert_eq!(loaded.data_dir, tmp.path().join("docs"));
        assert_eq!(loaded.paths.index_file, tmp.path().join("index.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[chunk]\nmax_chars = 512\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.chunk.max_chars, 512);
        assert_eq!(loaded.chunk.overlap_chars, 200);
        assert_eq!(loaded.embedding.dimension, 384);
    }

    #[test]
    fn test_resolve_without_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.toml");

        let config = Config::resolve(Some(&path)).unwrap();
        assert_eq!(config.paths.config_file, path);
        assert_eq!(config.paths.index_file, tmp.path().join("index.db"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.chunk.overlap_chars = config.chunk.max_chars;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.chunk.overlap_chars = 100;
        assert!(config.validate().is_ok());

        config.query.top_k = 0;
        assert!(config.validate().is_err());
        config.query.top_k = 3;

        config.embedding.dimension = 0;
        assert!(config.validate().is_err());
        config.embedding.dimension = 384;

        config.generation.max_retries = MAX_RETRIES + 1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        config.generation.max_retries = MAX_RETRIES;
        assert!(config.validate().is_ok());
    }
}
