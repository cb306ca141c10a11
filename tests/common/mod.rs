//! Shared fixtures for the end-to-end tests
//!
//! The model services are replaced by deterministic fakes so the pipeline
//! runs without Ollama or Qdrant.

#![allow(dead_code)]

use async_trait::async_trait;
use ragdoll::config::Config;
use ragdoll::embed::Embedder;
use ragdoll::generate::Generator;
use ragdoll::store::{SqliteStore, VectorStore};
use ragdoll::{QueryEngine, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase word hashes into one dimension
///
/// Same scheme as the crate's unit-test embedder: the first eight bytes of
/// the word's blake3 hash, little-endian, modulo the dimension.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = blake3::hash(word.to_lowercase().as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&hash.as_bytes()[..8]);
            vector[(u64::from_le_bytes(bytes) % DIM as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "hash"
    }
}

/// Echoes a fixed answer and keeps every prompt it was given
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("generated answer".to_string())
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

/// A workspace with a data directory and config rooted in a temp dir
pub struct Workspace {
    pub tmp: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_base_dir(tmp.path().to_path_buf());
        config.data_dir = tmp.path().join("data");
        config.embedding.dimension = DIM;
        std::fs::create_dir_all(&config.data_dir).unwrap();
        Self { tmp, config }
    }

    pub fn write(&self, rel: &str, content: impl AsRef<[u8]>) {
        let path = self.config.data_dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub async fn open_store(&self) -> Arc<dyn VectorStore> {
        let store = SqliteStore::open(
            &self.config.paths.index_file,
            &self.config.store.collection_name,
            DIM,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        Arc::new(store)
    }

    /// An engine over a fresh handle to the workspace's index file
    pub async fn engine(&self, generator: Arc<RecordingGenerator>) -> QueryEngine {
        QueryEngine::from_parts(
            self.config.clone(),
            Arc::new(HashEmbedder),
            self.open_store().await,
            generator,
        )
        .await
        .unwrap()
    }
}
