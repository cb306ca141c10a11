//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - An Ollama HTTP backend and an optional local fastembed backend
//! - Batch processing and dimension checks

#[cfg(feature = "local-embed")]
mod fastembed_impl;
mod ollama;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;
pub use ollama::*;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; output order matches input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed without checking vector lengths against [`Embedder::dimension`]
    ///
    /// Backends that validate inside `embed` override this so the startup
    /// check sees what the model actually returns.
    async fn embed_unchecked(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.embed(texts).await
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(config)?)),

        #[cfg(feature = "local-embed")]
        EmbeddingBackend::Fastembed => Ok(Arc::new(FastEmbedder::new(config)?)),

        #[cfg(not(feature = "local-embed"))]
        EmbeddingBackend::Fastembed => Err(Error::Config(
            "embedding backend 'fastembed' requires the 'local-embed' feature".to_string(),
        )),
    }
}

/// Embed a single text
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(vec![text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))
}

/// Helper to embed in batches, preserving input order
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for (i, chunk) in texts.chunks(batch_size.max(1)).enumerate() {
        debug!(batch = i, size = chunk.len(), "Embedding batch");
        let embeddings = embedder.embed(chunk.to_vec()).await?;
        if embeddings.len() != chunk.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunk.len(),
                embeddings.len()
            )));
        }
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

/// Reject vectors whose length differs from the expected dimension
pub fn validate_dimensions(model: &str, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if let Some(mismatch) = embeddings.iter().find(|v| v.len() != expected) {
        return Err(Error::Embedding(format!(
            "Embedding dimension mismatch for model '{}': expected {}, got {}",
            model,
            expected,
            mismatch.len()
        )));
    }
    Ok(())
}

/// Startup check: the model must actually produce `expected`-length vectors
pub async fn verify_dimension(embedder: &dyn Embedder, expected: usize) -> Result<()> {
    if embedder.dimension() != expected {
        return Err(Error::Config(format!(
            "Embedder '{}' declares dimension {} but {} is configured",
            embedder.model_name(),
            embedder.dimension(),
            expected
        )));
    }

    let sample = embedder
        .embed_unchecked(vec!["dimension check".to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("No embedding returned".to_string()))?;

    if sample.len() != expected {
        return Err(Error::Config(format!(
            "Embedding model '{}' produces {}-dimensional vectors but {} is configured",
            embedder.model_name(),
            sample.len(),
            expected
        )));
    }

    info!(
        model = embedder.model_name(),
        dimension = expected,
        "Embedding dimension verified"
    );
    Ok(())
}
