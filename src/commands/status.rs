//! Status command implementation

use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::extract::ExtractorRegistry;
use crate::index::scan_directory;
use crate::store::open_store;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub data_dir: String,
    pub data_files: usize,
    pub store_backend: String,
    pub store_location: String,
    pub collection_name: String,
    pub embedding_model: String,
    pub generation_model: String,
    pub store_connected: bool,
    pub record_count: usize,
}

/// Get system status without contacting the model services
pub async fn cmd_status(config: &Config) -> Result<StatusInfo> {
    info!("Getting status");

    let data_files = match scan_directory(&config.data_dir, &ExtractorRegistry::with_defaults()) {
        Ok(files) => files.len(),
        Err(e) => {
            debug!("Data directory scan: {}", e);
            0
        }
    };

    let (store_connected, record_count) = match open_store(config).await {
        Ok(store) => match store.count().await {
            Ok(count) => (true, count),
            Err(e) => {
                debug!("Store count error: {:?}", e);
                (false, 0)
            }
        },
        Err(e) => {
            debug!("Store connection error: {:?}", e);
            (false, 0)
        }
    };

    let (store_backend, store_location) = match config.store.backend {
        StoreBackend::Sqlite => ("sqlite", config.paths.index_file.display().to_string()),
        StoreBackend::Qdrant => ("qdrant", config.store.qdrant_url.clone()),
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        data_dir: config.data_dir.display().to_string(),
        data_files,
        store_backend: store_backend.to_string(),
        store_location,
        collection_name: config.store.collection_name.clone(),
        embedding_model: config.embedding.model.clone(),
        generation_model: config.generation.model.clone(),
        store_connected,
        record_count,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 ragdoll Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Data directory: {} ({} files)", status.data_dir, status.data_files);
    println!("\nVector store ({}):", status.store_backend);
    println!("  Location: {}", status.store_location);
    println!("  Collection: {}", status.collection_name);

    let connection_status = if !status.store_connected {
        "✗ Not connected"
    } else if status.record_count == 0 {
        "⚠ Connected (index empty - run 'ragdoll index' to build it)"
    } else {
        "✓ Connected"
    };
    println!("  Status: {}", connection_status);
    println!("  Vectors: {}", status.record_count);
    println!("\nEmbedding Model: {}", status.embedding_model);
    println!("Generation Model: {}", status.generation_model);
}
