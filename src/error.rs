//! Custom error types for ragdoll

use thiserror::Error;

/// Main error type for ragdoll operations
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal setup problem: bad sizing, missing data directory, dimension mismatch
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction failed for {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Qdrant error: {0}")]
    Qdrant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an extraction error naming the offending file
    pub fn extraction(path: &std::path::Path, message: impl Into<String>) -> Self {
        Error::Extraction {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Whether the indexer should skip the file and keep going
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::Extraction { .. } | Error::UnsupportedFormat(_) | Error::Io(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for ragdoll
pub type Result<T> = std::result::Result<T, Error>;

/// Convert qdrant errors
impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::Qdrant(err.to_string())
    }
}
