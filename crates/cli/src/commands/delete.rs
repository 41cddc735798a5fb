//! Delete command handler.

use clap::Args;
use ragvault_core::{config::AppConfig, AppError, AppResult};
use ragvault_knowledge::RagSystem;

/// Remove every stored chunk of a source document
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Source identifier (the path the document was ingested from)
    pub source_id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let rag = RagSystem::from_config(config).await?;
        let deleted = rag.delete_source(&self.source_id).await;
        rag.shutdown().await;

        if !deleted {
            return Err(AppError::Storage(format!(
                "Failed to delete source '{}'",
                self.source_id
            )));
        }

        println!("Deleted source '{}'", self.source_id);
        Ok(())
    }
}
