//! Status command handler.

use clap::Args;
use ragvault_core::{config::AppConfig, AppResult};
use ragvault_knowledge::RagSystem;

/// Show the active storage backend and how much it holds
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let rag = RagSystem::from_config(config).await?;
        let result = rag.status().await;
        rag.shutdown().await;
        let status = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("Backend: {}", status.backend);
            println!("  Dimensions: {}", status.dimensions);
            println!("  Records: {}", status.records);
            if let Some(path) = &config.config_file {
                println!("  Config: {}", path.display());
            }
        }

        Ok(())
    }
}
