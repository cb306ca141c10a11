//! Index and reindex command implementations

use crate::config::Config;
use crate::engine::global;
use crate::error::Result;
use crate::index::IndexReport;
use tracing::{info, warn};

/// Build the index if the collection is empty; `None` when it was already populated
pub async fn cmd_index(config: &Config) -> Result<Option<IndexReport>> {
    info!("Loading or building index");
    let (_, report) = global().get_with_report(config).await?;
    Ok(report)
}

/// Rebuild the collection from the data directory
///
/// With `recreate`, the collection may adopt a new embedding dimension or
/// model. It is only replaced after every chunk has been embedded.
pub async fn cmd_reindex(config: &Config, recreate: bool) -> Result<IndexReport> {
    if recreate {
        warn!(
            collection = %config.store.collection_name,
            model = %config.embedding.model,
            "Recreating collection"
        );
    }

    global().reindex(config, recreate).await
}

/// Print an index report to console
pub fn print_index_report(report: &IndexReport) {
    println!("\n✓ Index built in {} ms\n", report.elapsed_ms);
    println!("  Files scanned: {}", report.files_scanned);
    println!("  Documents indexed: {}", report.documents_indexed);
    println!("  Chunks indexed: {}", report.chunks_indexed);

    if !report.skipped.is_empty() {
        println!("\n⚠ Skipped {} file(s):", report.skipped.len());
        for skipped in &report.skipped {
            println!("  • {}: {}", skipped.path, skipped.reason);
        }
    }
}
