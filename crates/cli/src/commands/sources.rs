//! Sources command handler.

use clap::Args;
use ragvault_core::{config::AppConfig, AppResult};
use ragvault_knowledge::RagSystem;

/// List the documents held by the active storage backend
#[derive(Args, Debug)]
pub struct SourcesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SourcesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let rag = RagSystem::from_config(config).await?;
        let result = rag.sources().await;
        rag.shutdown().await;
        let sources = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&sources)?);
            return Ok(());
        }

        if sources.is_empty() {
            println!("No sources in {} storage", rag.backend_name());
            return Ok(());
        }

        println!("{} sources in {} storage:", sources.len(), rag.backend_name());
        for source in &sources {
            match source.first_stored_at {
                Some(at) => println!(
                    "  {} ({} chunks, since {})",
                    source.source_id,
                    source.chunks,
                    at.format("%Y-%m-%d %H:%M:%S")
                ),
                None => println!("  {} ({} chunks)", source.source_id, source.chunks),
            }
        }

        Ok(())
    }
}
