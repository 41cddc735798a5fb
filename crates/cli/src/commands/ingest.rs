//! Ingest command handler.

use clap::Args;
use ragvault_core::{config::AppConfig, AppResult};
use ragvault_knowledge::RagSystem;
use std::path::PathBuf;

/// Embed and store every supported document under a directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory to scan recursively
    pub directory: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Ingest options: {:?}", self);

        let rag = RagSystem::from_config(config).await?;
        let result = rag.ingest(&self.directory).await;
        rag.shutdown().await;
        let stats = result?;

        if self.json {
            let output = serde_json::json!({
                "directory": self.directory,
                "backend": rag.backend_name(),
                "stored": stats.stored,
                "skipped": stats.skipped,
                "failed": stats.failed,
                "total": stats.total(),
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} chunks from {:?} into {} storage: {} stored, {} skipped, {} failed ({:.2}s)",
                stats.total(),
                self.directory,
                rag.backend_name(),
                stats.stored,
                stats.skipped,
                stats.failed,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
