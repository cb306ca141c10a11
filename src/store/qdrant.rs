//! Qdrant vector database integration

use super::{
    check_k, check_vectors, dimension_mismatch, json_from_qdrant_value, model_mismatch,
    ChunkPayload, EmbeddingRecord, ScoredChunk, VectorStore,
};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, vectors_config, CountPointsBuilder, CreateCollectionBuilder,
    Distance, GetCollectionInfoResponse, PointId, PointStruct, ScalarQuantizationBuilder,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collection metadata key naming the embedding model
const MODEL_KEY: &str = "embedding_model";

/// Qdrant store handle
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Build a client from config; no request is sent until first use
    pub fn connect(config: &Config) -> Result<Self> {
        Self::new(
            &config.store.qdrant_url,
            config.qdrant_api_key(),
            &config.store.collection_name,
            config.embedding.dimension,
            Duration::from_secs(config.store.timeout_secs),
        )
    }

    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Qdrant(e.to_string()))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    async fn create_collection(&self, model: &str) -> Result<()> {
        info!(
            "Creating collection {} with dimension {} for model {}",
            self.collection, self.dimension, model
        );

        let vectors_config = VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors_config)
                    .quantization_config(ScalarQuantizationBuilder::default())
                    .metadata(model_metadata(model)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, model: &str) -> Result<()> {
        if !self.client.collection_exists(&self.collection).await? {
            return self.create_collection(model).await;
        }

        debug!("Collection {} already exists", self.collection);
        let info = self.client.collection_info(&self.collection).await?;
        match collection_vector_size(&info) {
            Some(size) if size != self.dimension => {
                return Err(dimension_mismatch(&self.collection, size, self.dimension));
            }
            Some(_) => {}
            None => {
                return Err(Error::Config(format!(
                    "Collection '{}' uses named vectors, which are not supported",
                    self.collection
                )));
            }
        }

        match collection_model(&info) {
            Some(stored) if stored != model => {
                Err(model_mismatch(&self.collection, &stored, model))
            }
            Some(_) => Ok(()),
            None => {
                // Servers before 1.15 drop collection metadata
                warn!(
                    collection = %self.collection,
                    "Collection does not record its embedding model; assuming {}",
                    model
                );
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
            "Upserting {} points to collection {}",
            records.len(),
            self.collection
        );

        let points: Vec<PointStruct> = records.into_iter().map(to_point_struct).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_k(k)?;
        debug!("Searching collection {} with limit {}", self.collection, k);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
                    .with_payload(true),
            )
            .await?;

        Ok(response
            .result
            .into_iter()
            .map(|p| {
                let map: Map<String, Value> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, json_from_qdrant_value(v)))
                    .collect();
                let (text, payload) = ChunkPayload::from_stored(map);
                ScoredChunk {
                    id: point_id_to_string(p.id),
                    text,
                    payload,
                    score: p.score,
                }
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        if !self.client.collection_exists(&self.collection).await? {
            return Ok(0);
        }
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn reset(&self, model: &str) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            info!("Deleting existing collection {}", self.collection);
            self.client.delete_collection(&self.collection).await?;
        }
        self.create_collection(model).await
    }

    /// Scrolls through every point
    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut all_ids = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut scroll = ScrollPointsBuilder::new(&self.collection)
                .limit(1000)
                .with_payload(false)
                .with_vectors(false);
            if let Some(ref o) = offset {
                scroll = scroll.offset(o.clone());
            }

            let response = self.client.scroll(scroll).await?;
            all_ids.extend(response.result.into_iter().map(|p| point_id_to_string(p.id)));

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        all_ids.sort();
        Ok(all_ids)
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn to_point_struct(record: EmbeddingRecord) -> PointStruct {
    let payload = record.payload.to_qdrant_payload(&record.text);
    PointStruct::new(record.id, record.vector, payload)
}

/// Size of the single unnamed vector, `None` for named-vector collections
fn collection_vector_size(info: &GetCollectionInfoResponse) -> Option<usize> {
    let params = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;

    match params {
        vectors_config::Config::Params(p) => Some(p.size as usize),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

fn model_metadata(model: &str) -> HashMap<String, Value> {
    HashMap::from([(MODEL_KEY.to_string(), Value::from(model))])
}

/// Embedding model recorded in the collection metadata, if any
fn collection_model(info: &GetCollectionInfoResponse) -> Option<String> {
    let value = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .metadata
        .get(MODEL_KEY)?;

    match json_from_qdrant_value(value.clone()) {
        Value::String(model) => Some(model),
        _ => None,
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}
