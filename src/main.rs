//! ragdoll CLI entry point

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use ragdoll::{
    commands::{
        cmd_ask, cmd_index, cmd_init, cmd_reindex, cmd_status, print_answer, print_index_report,
        print_init, print_status,
    },
    config::Config,
};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ragdoll")]
#[command(version, about = "Ask questions about a directory of documents", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "RAGDOLL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the data directory
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Build the index if it is empty
    Index,

    /// Rebuild the index from the data directory
    Reindex {
        /// Drop and recreate the collection (needed after changing the embedding model)
        #[arg(long)]
        recreate: bool,
    },

    /// Ask a question about the indexed documents
    Ask {
        /// The question
        question: String,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ragdoll", &mut std::io::stdout());
        }

        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(Config::default_config_path);
            let config = cmd_init(path, force)
                .await
                .context("Failed to initialize ragdoll")?;
            print_init(&config);
        }

        Commands::Index => {
            let config = load_config(cli.config)?;
            match cmd_index(&config).await.context("Indexing failed")? {
                Some(report) if cli.json => println!("{}", serde_json::to_string_pretty(&report)?),
                Some(report) => print_index_report(&report),
                None if cli.json => println!("null"),
                None => println!("✓ Index already built. Use 'ragdoll reindex' to rebuild it."),
            }
        }

        Commands::Reindex { recreate } => {
            let config = load_config(cli.config)?;
            let report = cmd_reindex(&config, recreate)
                .await
                .context("Reindex failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_index_report(&report);
            }
        }

        Commands::Ask { question } => {
            let config = load_config(cli.config)?;
            let answer = cmd_ask(&config, &question)
                .await
                .context("Could not answer the question")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }

        Commands::Status => {
            let config = load_config(cli.config)?;
            let status = cmd_status(&config).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (plain, json) = if json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::resolve(path.as_deref()).context("Failed to load configuration")
}
