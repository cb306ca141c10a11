//! Embedded vector index in a single SQLite file
//!
//! Vectors are stored as little-endian f32 blobs; similarity is computed in-process.

use super::{
    check_k, check_vectors, dimension_mismatch, model_mismatch, rank_order, ChunkPayload,
    EmbeddingRecord, ScoredChunk, VectorStore,
};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, Sqlite, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// SQL schema for the vector index
pub const SCHEMA_SQL: &str = r#"
-- Collections: one row per named index with its fixed dimension and embedding model
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Records: chunk vectors with their text and provenance
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    id TEXT NOT NULL,
    vector BLOB NOT NULL,
    text TEXT NOT NULL,
    metadata_json TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

#[derive(FromRow)]
struct RecordRow {
    id: String,
    vector: Vec<u8>,
    text: String,
    metadata_json: String,
}

/// SQLite-backed vector store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
    dimension: usize,
}

impl SqliteStore {
    /// Open the index file named by the configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(
            &config.paths.index_file,
            &config.store.collection_name,
            config.embedding.dimension,
            Duration::from_secs(config.store.timeout_secs),
        )
        .await
    }

    /// Open (creating if missing) an index file and apply the schema
    pub async fn open(
        db_path: &Path,
        collection: &str,
        dimension: usize,
        busy_timeout: Duration,
    ) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        debug!("Opening vector index at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Dimension and embedding model recorded for the collection, if it exists
    pub async fn stored_params(&self) -> Result<Option<(usize, String)>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT dimension, model FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(d, model)| (d as usize, model)))
    }

    async fn create_collection(&self, tx: &mut Transaction<'_, Sqlite>, model: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (name, dimension, model, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                dimension = excluded.dimension,
                model = excluded.model,
                created_at = excluded.created_at
            "#,
        )
        .bind(&self.collection)
        .bind(self.dimension as i64)
        .bind(model)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn ensure_collection(&self, model: &str) -> Result<()> {
        match self.stored_params().await? {
            Some((stored, _)) if stored != self.dimension => {
                Err(dimension_mismatch(&self.collection, stored, self.dimension))
            }
            Some((_, stored_model)) if stored_model != model => {
                Err(model_mismatch(&self.collection, &stored_model, model))
            }
            Some(_) => {
                debug!("Collection {} already exists", self.collection);
                Ok(())
            }
            None => {
                info!(
                    "Creating collection {} with dimension {} for model {}",
                    self.collection, self.dimension, model
                );
                let mut tx = self.pool.begin().await?;
                self.create_collection(&mut tx, model).await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_vectors(&self.collection, self.dimension, &records)?;

        debug!(
            "Upserting {} records to collection {}",
            records.len(),
            self.collection
        );

        let mut tx = self.pool.begin().await?;
        for record in records {
            let metadata_json = serde_json::to_string(&record.payload)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, vector, text, metadata_json)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    vector = excluded.vector,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(encode_vector(&record.vector))
            .bind(&record.text)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_k(k)?;
        if vector.len() != self.dimension {
            return Err(Error::Store(format!(
                "Query vector has dimension {}, collection '{}' expects {}",
                vector.len(),
                self.collection,
                self.dimension
            )));
        }

        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT id, vector, text, metadata_json FROM records WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = decode_vector(&row.vector)?;
            let payload: ChunkPayload = serde_json::from_str(&row.metadata_json)?;
            hits.push(ScoredChunk {
                score: super::cosine_similarity(vector, &stored),
                id: row.id,
                text: row.text,
                payload,
            });
        }

        hits.sort_by(rank_order);
        hits.truncate(k);
        debug!(
            "Query on {} returned {} of requested {}",
            self.collection,
            hits.len(),
            k
        );
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn reset(&self, model: &str) -> Result<()> {
        info!("Resetting collection {}", self.collection);
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        self.create_collection(&mut tx, model).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM records WHERE collection = ? ORDER BY id")
                .bind(&self.collection)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Store(format!(
            "Corrupt vector blob of {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
