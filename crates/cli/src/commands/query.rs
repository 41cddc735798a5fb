//! Query command handler.

use clap::Args;
use ragvault_core::{config::AppConfig, AppResult};
use ragvault_knowledge::{QueryOptions, RagSystem, RetrievedChunk};
use std::path::PathBuf;

/// Retrieve the chunks most similar to a query
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// Query text
    pub text: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value_t = 5)]
    pub top_k: usize,

    /// Drop results scoring below this (0 keeps everything)
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f32,

    /// Ingest these directories before querying
    #[arg(long = "load", value_name = "DIR")]
    pub load: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Query options: {:?}", self);

        let rag = RagSystem::from_config(config).await?;
        let result = self.run(&rag).await;
        rag.shutdown().await;
        let results = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            print_results(&results);
        }

        Ok(())
    }

    async fn run(&self, rag: &RagSystem) -> AppResult<Vec<RetrievedChunk>> {
        for directory in &self.load {
            let stats = rag.ingest(directory).await?;
            tracing::info!(
                "Loaded {:?}: {} stored, {} skipped, {} failed",
                directory,
                stats.stored,
                stats.skipped,
                stats.failed
            );
        }

        let options = QueryOptions {
            top_k: self.top_k,
            threshold: self.threshold,
        };
        rag.query(&self.text, options).await
    }
}

fn print_results(results: &[RetrievedChunk]) {
    if results.is_empty() {
        println!("No matching chunks.");
        return;
    }

    for (i, chunk) in results.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, chunk.score, chunk.source_id);
        for line in chunk.text.lines() {
            println!("   {}", line);
        }
        println!();
    }
}
