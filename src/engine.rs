//! Query engine: the question-answering entry point
//!
//! Wires the embedder, store, indexer, retriever and synthesizer together.
//! [`SharedEngine`] holds one engine per process so that the first question
//! connects and builds exactly once.

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embed::{create_embedder, embed_one, verify_dimension, Embedder};
use crate::error::{Error, Result};
use crate::extract::ExtractorRegistry;
use crate::generate::{create_generator, Generator};
use crate::index::{IndexReport, IndexState, Indexer};
use crate::retrieve::Retriever;
use crate::store::{open_store, ScoredChunk, VectorStore};
use crate::synthesize::AnswerSynthesizer;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A generated answer with the chunks it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceExcerpt>,
}

/// One supporting chunk, in rank order
#[derive(Debug, Clone, Serialize)]
pub struct SourceExcerpt {
    /// Leading characters of the chunk text
    pub text: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl SourceExcerpt {
    fn from_hit(hit: &ScoredChunk, preview_chars: usize) -> Self {
        let file_name = &hit.payload.file_name;
        Self {
            text: preview(&hit.text, preview_chars),
            score: hit.score,
            source_file: (!file_name.is_empty()).then(|| file_name.clone()),
        }
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => format!("{}...", &text[..byte_end]),
        None => text.to_string(),
    }
}

/// Answers questions over one collection
pub struct QueryEngine {
    config: Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    indexer: Indexer,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

type Parts = (Arc<dyn Embedder>, Arc<dyn VectorStore>, Arc<dyn Generator>);

impl QueryEngine {
    /// Build every collaborator from configuration and check they agree
    pub async fn connect(config: &Config) -> Result<Self> {
        let (embedder, store, generator) = Self::open_parts(config).await?;
        Self::from_parts(config.clone(), embedder, store, generator).await
    }

    /// Connect and rebuild the collection from scratch
    ///
    /// The stored collection's dimension and model are not checked: the
    /// rebuild replaces it. Nothing is dropped until every chunk is embedded.
    pub async fn connect_and_rebuild(config: &Config) -> Result<(Self, IndexReport)> {
        let (embedder, store, generator) = Self::open_parts(config).await?;
        Self::rebuild_from_parts(config.clone(), embedder, store, generator).await
    }

    async fn open_parts(config: &Config) -> Result<Parts> {
        let embedder = create_embedder(&config.embedding)?;
        let store = open_store(config).await?;
        let generator = create_generator(&config.generation)?;

        verify_dimension(embedder.as_ref(), store.dimension()).await?;
        Ok((embedder, store, generator))
    }

    /// Wire injected collaborators over an existing or new collection
    ///
    /// The embedder and store must share a dimension, and a stored collection
    /// must have been built by the same embedding model.
    pub async fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        check_parts(embedder.as_ref(), store.as_ref())?;
        store.ensure_collection(embedder.model_name()).await?;
        Self::assemble(config, embedder, store, generator)
    }

    /// Wire injected collaborators and replace the collection with a fresh build
    pub async fn rebuild_from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<(Self, IndexReport)> {
        check_parts(embedder.as_ref(), store.as_ref())?;
        let engine = Self::assemble(config, embedder, store, generator)?;
        let report = engine.reindex().await?;
        Ok((engine, report))
    }

    fn assemble(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let indexer = Indexer::new(
            config.data_dir.clone(),
            ExtractorRegistry::with_defaults(),
            Chunker::from_config(&config.chunk)?,
            embedder.clone(),
            store.clone(),
            config.embedding.batch_size,
        );
        let retriever = Retriever::new(store.clone(), config.query.top_k);
        let synthesizer = AnswerSynthesizer::new(generator);

        info!(
            collection = store.collection_name(),
            model = embedder.model_name(),
            "Query engine ready"
        );

        Ok(Self {
            config,
            embedder,
            store,
            indexer,
            retriever,
            synthesizer,
        })
    }

    /// Answer `question` from the indexed documents
    ///
    /// Builds the index on first use if the collection is empty.
    pub async fn answer_question(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        self.indexer.get_or_build().await?;

        debug!(question, "Answering question");
        let query_vector = embed_one(self.embedder.as_ref(), question).await?;
        let hits = self.retriever.retrieve_top(&query_vector).await?;
        let answer = self.synthesizer.synthesize(question, &hits).await?;

        let preview_chars = self.config.query.preview_chars;
        Ok(Answer {
            answer,
            sources: hits
                .iter()
                .map(|hit| SourceExcerpt::from_hit(hit, preview_chars))
                .collect(),
        })
    }

    /// Load or build the index without asking anything
    pub async fn ensure_index(&self) -> Result<Option<IndexReport>> {
        self.indexer.get_or_build().await
    }

    /// Number of records in the collection
    pub async fn document_count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Rebuild from the data directory; safe to call repeatedly
    pub async fn reindex(&self) -> Result<IndexReport> {
        self.indexer.full_reindex().await
    }

    pub fn state(&self) -> IndexState {
        self.indexer.state()
    }
}

fn check_parts(embedder: &dyn Embedder, store: &dyn VectorStore) -> Result<()> {
    if embedder.dimension() != store.dimension() {
        return Err(Error::Config(format!(
            "Embedder '{}' produces {}-dimensional vectors but collection '{}' expects {}",
            embedder.model_name(),
            embedder.dimension(),
            store.collection_name(),
            store.dimension()
        )));
    }
    Ok(())
}

/// Process-wide engine slot
///
/// The first caller connects (and builds the index if needed) while holding
/// the slot lock, so concurrent first questions wait for a single build.
/// The configuration of the first successful connect is kept until
/// [`SharedEngine::invalidate`].
#[derive(Default)]
pub struct SharedEngine {
    slot: Mutex<Option<Arc<QueryEngine>>>,
}

impl SharedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared engine, connected and indexed on first use
    pub async fn get(&self, config: &Config) -> Result<Arc<QueryEngine>> {
        Ok(self.get_with_report(config).await?.0)
    }

    /// Like [`SharedEngine::get`], also returning the report of a build this call ran
    pub async fn get_with_report(
        &self,
        config: &Config,
    ) -> Result<(Arc<QueryEngine>, Option<IndexReport>)> {
        let mut slot = self.slot.lock().await;
        let engine = match slot.as_ref() {
            Some(engine) => engine.clone(),
            None => Arc::new(QueryEngine::connect(config).await?),
        };

        let report = engine.ensure_index().await?;
        *slot = Some(engine.clone());
        Ok((engine, report))
    }

    pub async fn answer_question(&self, config: &Config, question: &str) -> Result<Answer> {
        self.get(config).await?.answer_question(question).await
    }

    /// Rebuild under the slot lock; connects without a lazy build first
    ///
    /// With `recreate`, the cached engine is dropped and the collection is
    /// replaced even if it was built at another dimension or by another model.
    /// A failed recreate leaves the slot empty.
    pub async fn reindex(&self, config: &Config, recreate: bool) -> Result<IndexReport> {
        let mut slot = self.slot.lock().await;
        if recreate {
            slot.take();
            let (engine, report) = QueryEngine::connect_and_rebuild(config).await?;
            *slot = Some(Arc::new(engine));
            return Ok(report);
        }

        let engine = match slot.as_ref() {
            Some(engine) => engine.clone(),
            None => {
                let engine = Arc::new(QueryEngine::connect(config).await?);
                *slot = Some(engine.clone());
                engine
            }
        };
        engine.reindex().await
    }

    /// Drop the cached engine; the next call reconnects
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

/// The process-wide [`SharedEngine`]
pub fn global() -> &'static SharedEngine {
    static GLOBAL: OnceLock<SharedEngine> = OnceLock::new();
    GLOBAL.get_or_init(SharedEngine::new)
}
