//! Vector index storage
//!
//! This module persists chunk embeddings and answers nearest-neighbour queries:
//! - `SqliteStore`, an embedded single-file index (default)
//! - `QdrantStore`, an external Qdrant collection
//!
//! Both hold one named collection of fixed dimension and rank by cosine similarity.
//! The collection also records the embedding model that produced its vectors;
//! vectors from different models are not comparable even at equal dimension.

mod payload;
mod qdrant;
mod sqlite;

pub use payload::*;
pub use qdrant::*;
pub use sqlite::*;

use crate::config::{Config, StoreBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;

/// A chunk ready to be written to the index
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub payload: ChunkPayload,
}

/// A stored chunk with its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub payload: ChunkPayload,
    pub score: f32,
}

/// Persistent collection of embedding records
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection for `model` if missing
    ///
    /// A stored dimension or model that differs is a `Config` error.
    async fn ensure_collection(&self, model: &str) -> Result<()>;

    /// Insert or replace records by id
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    async fn upsert_one(&self, record: EmbeddingRecord) -> Result<()> {
        self.upsert(vec![record]).await
    }

    /// At most `k` records, highest score first
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self) -> Result<usize>;

    /// Drop every record and recreate the collection at the configured dimension for `model`
    async fn reset(&self, model: &str) -> Result<()>;

    async fn list_ids(&self) -> Result<Vec<String>>;

    fn collection_name(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Open the configured backend without touching the collection
pub async fn open_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::connect(config).await?)),
        StoreBackend::Qdrant => Ok(Arc::new(QdrantStore::connect(config)?)),
    }
}

/// Reject `k == 0` before any backend work
pub fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidArgument(
            "k must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Reject records whose vector length differs from the collection's
pub fn check_vectors(collection: &str, dimension: usize, records: &[EmbeddingRecord]) -> Result<()> {
    if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
        return Err(Error::Store(format!(
            "Vector dimension mismatch for collection '{}': expected {} (got {}) for record {}",
            collection,
            dimension,
            bad.vector.len(),
            bad.id
        )));
    }
    Ok(())
}

/// Error for a collection built with a different embedding model
pub fn model_mismatch(collection: &str, stored: &str, model: &str) -> Error {
    Error::Config(format!(
        "Collection '{}' was built with embedding model '{}' but '{}' is configured. \
         Run `ragdoll reindex --recreate` to rebuild it.",
        collection, stored, model
    ))
}

/// Error for a collection built at a different dimension
pub fn dimension_mismatch(collection: &str, stored: usize, dimension: usize) -> Error {
    Error::Config(format!(
        "Collection '{}' holds {}-dimensional vectors but embedding.dimension is {}. \
         Run `ragdoll reindex --recreate` to rebuild it.",
        collection, stored, dimension
    ))
}

/// Cosine similarity in [-1, 1]; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Descending score; ties broken by id so results are stable
pub fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}
