//! Top-K similarity retrieval

use crate::error::Result;
use crate::store::{ScoredChunk, VectorStore};
use std::sync::Arc;
use tracing::debug;

/// Ranks stored chunks against a query vector
///
/// Pure delegation to the store: no reranking, filtering or deduplication.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `k` most similar chunks, best first; fewer if the collection is smaller
    pub async fn retrieve(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let hits = self.store.query(query_vector, k).await?;
        debug!(requested = k, returned = hits.len(), "Retrieved chunks");
        Ok(hits)
    }

    pub async fn retrieve_top(&self, query_vector: &[f32]) -> Result<Vec<ScoredChunk>> {
        self.retrieve(query_vector, self.top_k).await
    }
}
