//! Index lifecycle
//!
//! The indexer turns the data directory into a populated collection:
//! scan → extract → chunk → embed → reset → upsert. A full rebuild replaces
//! the collection wholesale; there is no incremental update.
//!
//! Builds are serialized by one async mutex, which doubles as the barrier
//! that makes lazy first-use initialization happen exactly once. Once the
//! collection is ready, queries skip the mutex.

use crate::chunk::Chunker;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::{Error, Result};
use crate::extract::{Document, ExtractorRegistry};
use crate::store::{ChunkPayload, EmbeddingRecord, VectorStore};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Files extracted concurrently during a build
const EXTRACT_CONCURRENCY: usize = 4;

/// Records written per upsert call
const UPSERT_BATCH_SIZE: usize = 256;

/// Lifecycle of the collection as seen by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Nothing built or loaded yet
    Empty,
    /// A build is running
    Indexing,
    /// The collection can serve queries
    Ready,
    /// The last build failed; the collection may be empty
    Failed,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexState::Empty => write!(f, "empty"),
            IndexState::Indexing => write!(f, "indexing"),
            IndexState::Ready => write!(f, "ready"),
            IndexState::Failed => write!(f, "failed"),
        }
    }
}

/// A file left out of the index, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Outcome of one full build
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub skipped: Vec<SkippedFile>,
    pub elapsed_ms: u64,
}

/// Supported files under `data_dir`, recursively, in path order
///
/// Hidden entries are skipped. A missing directory or one without a single
/// supported file is a configuration error.
pub fn scan_directory(data_dir: &Path, registry: &ExtractorRegistry) -> Result<Vec<PathBuf>> {
    if !data_dir.exists() {
        return Err(Error::Config(format!(
            "Data directory not found: {}",
            data_dir.display()
        )));
    }
    if !data_dir.is_dir() {
        return Err(Error::Config(format!(
            "Data path is not a directory: {}",
            data_dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(data_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && registry.supports(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();

    if files.is_empty() {
        let formats: Vec<&str> = registry.formats().iter().map(|f| f.as_str()).collect();
        return Err(Error::Config(format!(
            "No supported documents ({}) found in {}",
            formats.join(", "),
            data_dir.display()
        )));
    }

    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Builds and owns the lifecycle of one collection
pub struct Indexer {
    data_dir: PathBuf,
    registry: ExtractorRegistry,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
    state: RwLock<IndexState>,
    build_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        data_dir: PathBuf,
        registry: ExtractorRegistry,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            data_dir,
            registry,
            chunker,
            embedder,
            store,
            batch_size,
            state: RwLock::new(IndexState::Empty),
            build_lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> IndexState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: IndexState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Make the collection queryable, building it only if it holds nothing
    ///
    /// A non-empty persisted collection is trusted as-is; changes to the data
    /// directory are picked up only by [`Indexer::full_reindex`].
    pub async fn get_or_build(&self) -> Result<Option<IndexReport>> {
        if self.state() == IndexState::Ready {
            return Ok(None);
        }

        let _guard = self.build_lock.lock().await;

        if self.state() == IndexState::Ready {
            return Ok(None);
        }

        let count = self.store.count().await?;
        if count > 0 {
            info!(
                collection = self.store.collection_name(),
                records = count,
                "Loaded existing index"
            );
            self.set_state(IndexState::Ready);
            return Ok(None);
        }

        self.build().await.map(Some)
    }

    /// Rebuild the collection from every file in the data directory
    pub async fn full_reindex(&self) -> Result<IndexReport> {
        let _guard = self.build_lock.lock().await;
        self.build().await
    }

    async fn build(&self) -> Result<IndexReport> {
        let started = Instant::now();
        let files = scan_directory(&self.data_dir, &self.registry)?;

        let previous = self.state();
        self.set_state(IndexState::Indexing);
        info!(
            data_dir = %self.data_dir.display(),
            files = files.len(),
            "Starting full index build"
        );

        let (documents, mut skipped) = match self.extract_all(&files).await {
            Ok(extracted) => extracted,
            Err(e) => {
                self.set_state(previous);
                return Err(e);
            }
        };

        let mut records = Vec::new();
        let mut documents_indexed = 0;
        for doc in &documents {
            if doc.text.trim().is_empty() {
                debug!(path = %doc.source_path, "Document has no text");
                skipped.push(SkippedFile {
                    path: doc.source_path.clone(),
                    reason: "no extractable text".to_string(),
                });
                continue;
            }

            records.extend(self.chunker.split(&doc.text, &doc.source_path).map(|chunk| {
                EmbeddingRecord {
                    id: chunk.chunk_id,
                    vector: Vec::new(),
                    payload: ChunkPayload {
                        source_path: chunk.source_path,
                        file_name: doc.file_name.clone(),
                        format: doc.format.as_str().to_string(),
                        start_offset: chunk.start_offset,
                        length: chunk.length,
                        chunk_index: chunk.index,
                        doc_hash: doc.content_hash.clone(),
                    },
                    text: chunk.text,
                }
            }));
            documents_indexed += 1;
        }

        if records.is_empty() {
            self.set_state(previous);
            return Err(Error::Config(format!(
                "No indexable text found in {} ({} files skipped)",
                self.data_dir.display(),
                skipped.len()
            )));
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = match embed_in_batches(self.embedder.as_ref(), texts, self.batch_size).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Embedding failed, index left untouched: {}", e);
                self.set_state(IndexState::Failed);
                return Err(e);
            }
        };
        for (record, vector) in records.iter_mut().zip(vectors) {
            record.vector = vector;
        }

        let chunks_indexed = records.len();
        if let Err(e) = self.replace_collection(records).await {
            error!(
                collection = self.store.collection_name(),
                "Index write failed after reset, collection may be empty: {}",
                e
            );
            self.set_state(IndexState::Failed);
            return Err(e);
        }

        self.set_state(IndexState::Ready);
        let report = IndexReport {
            files_scanned: files.len(),
            documents_indexed,
            chunks_indexed,
            skipped,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            documents = report.documents_indexed,
            chunks = report.chunks_indexed,
            skipped = report.skipped.len(),
            elapsed_ms = report.elapsed_ms,
            "Index build complete"
        );
        Ok(report)
    }

    /// Extract every file, turning per-file failures into skipped entries
    ///
    /// Any other failure aborts the build.
    async fn extract_all(&self, files: &[PathBuf]) -> Result<(Vec<Document>, Vec<SkippedFile>)> {
        let results: Vec<(PathBuf, Result<Document>)> = stream::iter(files.iter().cloned())
            .map(|path| async move {
                let result = self.registry.load_document(&self.data_dir, &path).await;
                (path, result)
            })
            .buffered(EXTRACT_CONCURRENCY)
            .collect()
            .await;

        let mut documents = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (path, result) in results {
            match result {
                Ok(doc) => documents.push(doc),
                Err(e) if !e.is_per_file() => return Err(e),
                Err(e) => {
                    warn!(path = %path.display(), "Skipping file: {}", e);
                    skipped.push(SkippedFile {
                        path: crate::extract::source_path_for(&self.data_dir, &path),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok((documents, skipped))
    }

    async fn replace_collection(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        self.store.reset(self.embedder.model_name()).await?;
        let mut iter = records.into_iter().peekable();
        while iter.peek().is_some() {
            let batch: Vec<EmbeddingRecord> = iter.by_ref().take(UPSERT_BATCH_SIZE).collect();
            debug!(size = batch.len(), "Writing batch");
            self.store.upsert(batch).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::extract::{DocumentFormat, TextExtractor};
    use crate::testing::{FailingEmbedder, HashEmbedder};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    const DIM: usize = 32;

    async fn setup_indexer(
        embedder: Arc<dyn Embedder>,
        max_chars: usize,
    ) -> (Indexer, Arc<dyn VectorStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        let store = SqliteStore::open(
            &tmp.path().join("index.db"),
            "documents",
            DIM,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        store.ensure_collection("hash").await.unwrap();
        let store: Arc<dyn VectorStore> = Arc::new(store);

        let indexer = Indexer::new(
            tmp.path().join("data"),
            ExtractorRegistry::with_defaults(),
            Chunker::new(max_chars, max_chars / 4).unwrap(),
            embedder,
            store.clone(),
            8,
        );
        (indexer, store, tmp)
    }

    fn write(tmp: &TempDir, rel: &str, content: &[u8]) {
        let path = tmp.path().join("data").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_directory_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("b.txt"), "b").unwrap();
        std::fs::write(root.join("a.MD"), "a").unwrap();
        std::fs::write(root.join("sub/c.docx"), "c").unwrap();
        std::fs::write(root.join("image.png"), "x").unwrap();
        std::fs::write(root.join(".hidden.txt"), "h").unwrap();
        std::fs::write(root.join(".git/config.txt"), "g").unwrap();

        let files = scan_directory(root, &ExtractorRegistry::with_defaults()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| crate::extract::source_path_for(root, p))
            .collect();
        assert_eq!(names, vec!["a.MD", "b.txt", "sub/c.docx"]);
    }

    #[test]
    fn test_scan_directory_errors() {
        let tmp = TempDir::new().unwrap();
        let registry = ExtractorRegistry::with_defaults();

        assert!(matches!(
            scan_directory(&tmp.path().join("missing"), &registry),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            scan_directory(tmp.path(), &registry),
            Err(Error::Config(_))
        ));

        std::fs::write(tmp.path().join("file.txt"), "x").unwrap();
        assert!(matches!(
            scan_directory(&tmp.path().join("file.txt"), &registry),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_full_reindex_builds_collection() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "notes.txt", "Paris is the capital of France.".as_bytes());
        write(&tmp, "guide/long.md", "# Guide\n\n".repeat(30).as_bytes());

        let report = indexer.full_reindex().await.unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.documents_indexed, 2);
        assert!(report.chunks_indexed > 2);
        assert!(report.skipped.is_empty());
        assert_eq!(store.count().await.unwrap(), report.chunks_indexed);
        assert_eq!(indexer.state(), IndexState::Ready);
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 40).await;
        write(&tmp, "a.txt", "alpha beta gamma delta ".repeat(10).as_bytes());
        write(&tmp, "b.txt", b"just one short line");

        indexer.full_reindex().await.unwrap();
        let first = store.list_ids().await.unwrap();
        indexer.full_reindex().await.unwrap();
        let second = store.list_ids().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count().await.unwrap(), first.len());
    }

    #[tokio::test]
    async fn test_removed_files_disappear_on_reindex() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "keep.txt", b"kept");
        write(&tmp, "drop.txt", b"dropped");
        indexer.full_reindex().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        std::fs::remove_file(tmp.path().join("data/drop.txt")).unwrap();
        indexer.full_reindex().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_files_are_skipped() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "good.txt", b"readable text");
        write(&tmp, "binary.txt", b"\x00\x01\x02garbage");
        write(&tmp, "broken.docx", b"not a zip");
        write(&tmp, "blank.md", b"   \n\n");

        let report = indexer.full_reindex().await.unwrap();

        assert_eq!(report.files_scanned, 4);
        assert_eq!(report.documents_indexed, 1);
        let mut skipped: Vec<&str> = report.skipped.iter().map(|s| s.path.as_str()).collect();
        skipped.sort();
        assert_eq!(skipped, vec!["binary.txt", "blank.md", "broken.docx"]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nothing_indexable_keeps_previous_state() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "good.txt", b"first build");
        indexer.full_reindex().await.unwrap();

        std::fs::write(tmp.path().join("data/good.txt"), b"\x00binary now").unwrap();
        let err = indexer.full_reindex().await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(indexer.state(), IndexState::Ready);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_directory_is_config_error() {
        let (indexer, store, _tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;

        assert!(matches!(
            indexer.full_reindex().await,
            Err(Error::Config(_))
        ));
        assert_eq!(indexer.state(), IndexState::Empty);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_store_untouched() {
        let (good, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "a.txt", b"original content");
        good.full_reindex().await.unwrap();

        let failing = Indexer::new(
            tmp.path().join("data"),
            ExtractorRegistry::with_defaults(),
            Chunker::new(64, 16).unwrap(),
            Arc::new(FailingEmbedder::new(DIM)),
            store.clone(),
            8,
        );
        let err = failing.full_reindex().await.unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(failing.state(), IndexState::Failed);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    /// Text extractor whose backing service is gone
    struct BrokenTextExtractor;

    #[async_trait]
    impl TextExtractor for BrokenTextExtractor {
        fn format(&self) -> DocumentFormat {
            DocumentFormat::PlainText
        }

        async fn extract(&self, _path: &Path) -> Result<String> {
            Err(Error::Other("extractor backend unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_non_file_extraction_error_aborts_build() {
        let (good, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "a.txt", b"original content");
        good.full_reindex().await.unwrap();

        let mut registry = ExtractorRegistry::with_defaults();
        registry.register(BrokenTextExtractor);
        let broken = Indexer::new(
            tmp.path().join("data"),
            registry,
            Chunker::new(64, 16).unwrap(),
            Arc::new(HashEmbedder::new(DIM)),
            store.clone(),
            8,
        );
        let err = broken.full_reindex().await.unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert_eq!(broken.state(), IndexState::Empty);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ready_index_skips_build_lock() {
        let (indexer, _store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "a.txt", b"first");
        indexer.get_or_build().await.unwrap();

        let _held = indexer.build_lock.lock().await;
        let result = tokio::time::timeout(Duration::from_secs(1), indexer.get_or_build()).await;
        assert!(matches!(result, Ok(Ok(None))));
    }

    #[tokio::test]
    async fn test_get_or_build_trusts_existing_records() {
        let (indexer, store, tmp) = setup_indexer(Arc::new(HashEmbedder::new(DIM)), 64).await;
        write(&tmp, "a.txt", b"first");

        let report = indexer.get_or_build().await.unwrap();
        assert!(report.is_some());
        assert!(indexer.get_or_build().await.unwrap().is_none());

        // A fresh indexer over the same store does not rebuild
        write(&tmp, "b.txt", b"added later");
        let fresh = Indexer::new(
            tmp.path().join("data"),
            ExtractorRegistry::with_defaults(),
            Chunker::new(64, 16).unwrap(),
            Arc::new(HashEmbedder::new(DIM)),
            store.clone(),
            8,
        );
        assert!(fresh.get_or_build().await.unwrap().is_none());
        assert_eq!(fresh.state(), IndexState::Ready);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
