//! Default values for configuration

use std::path::PathBuf;

/// Default document directory (`RAGDOLL_DATA_DIR` or `./data`)
pub fn default_data_dir() -> PathBuf {
    std::env::var("RAGDOLL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Default Qdrant URL for local development
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "QDRANT_API_KEY".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "documents".to_string()
}

/// Default vector store request timeout in seconds
pub fn default_store_timeout() -> u64 {
    30
}

/// Default Ollama base URL, shared by embedding and generation
pub fn default_ollama_url() -> String {
    std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

/// Default embedding model (all-MiniLM-L6-v2 as served by Ollama)
pub fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

/// Default embedding dimension for all-MiniLM-L6-v2
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default number of retries for transient service failures
pub fn default_max_retries() -> usize {
    2
}

/// Upper bound accepted for any `max_retries`
pub const MAX_RETRIES: usize = 10;

/// Default generation model
pub fn default_generation_model() -> String {
    "llama3.2:1b".to_string()
}

/// Default generation timeout in seconds (local inference is slow)
pub fn default_generation_timeout() -> u64 {
    120
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    1024
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Default number of chunks retrieved per question
pub fn default_query_top_k() -> usize {
    5
}

/// Default excerpt preview length in characters
pub fn default_preview_chars() -> usize {
    200
}
