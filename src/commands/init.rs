//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Write a default config file and create the data directory
pub async fn cmd_init(config_path: PathBuf, force: bool) -> Result<Config> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);
    let mut config = Config::with_base_dir(base_dir);
    config.paths.config_file = config_path;
    config.validate()?;
    config.save()?;

    tokio::fs::create_dir_all(&config.data_dir).await?;
    info!(data_dir = %config.data_dir.display(), "Initialized ragdoll");

    Ok(config)
}

/// Print init result to console
pub fn print_init(config: &Config) {
    println!("✓ Wrote configuration to {}", config.paths.config_file.display());
    println!("✓ Data directory: {}", config.data_dir.display());
    println!("\nPut .pdf, .txt, .md or .docx files in the data directory, then run 'ragdoll index'.");
}
