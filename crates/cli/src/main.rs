//! ragvault CLI
//!
//! Command-line front end for the vector storage and retrieval layer.

mod commands;

use clap::{Parser, Subcommand};
use commands::{DeleteCommand, IngestCommand, QueryCommand, SourcesCommand, StatusCommand};
use ragvault_core::config::{AppConfig, BackendKind};
use ragvault_core::{logging, AppResult};
use std::path::PathBuf;
use tracing::Instrument;

/// ragvault - vector storage and retrieval for RAG
#[derive(Parser, Debug)]
#[command(name = "ragvault")]
#[command(about = "Vector storage and retrieval for RAG", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "RAGVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Storage backend (matrixone, memory)
    #[arg(short, long, global = true)]
    storage: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Embed and store the documents of a directory
    Ingest(IngestCommand),

    /// Retrieve the chunks most similar to a query
    Query(QueryCommand),

    /// Delete every chunk of a source
    Delete(DeleteCommand),

    /// List stored sources
    Sources(SourcesCommand),

    /// Show backend status
    Status(StatusCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(
        cli.storage,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(
        config.logging.level.as_deref(),
        !config.logging.color,
        config.logging.format,
    )?;

    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!("Storage: {:?}", config.storage.backend);
    tracing::debug!(
        "Embedding: {} ({}, {} dimensions)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );

    let command = cli.command;
    let command_name = match &command {
        Commands::Ingest(_) => "ingest",
        Commands::Query(_) => "query",
        Commands::Delete(_) => "delete",
        Commands::Sources(_) => "sources",
        Commands::Status(_) => "status",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match &command {
            Commands::Ingest(cmd) => cmd.execute(&config).await,
            Commands::Query(cmd) => cmd.execute(&config).await,
            Commands::Delete(cmd) => cmd.execute(&config).await,
            Commands::Sources(cmd) => cmd.execute(&config).await,
            Commands::Status(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
