//! Startup backend selection.

use super::{MatrixOneStore, MemoryStore, StorageBackend};
use ragvault_core::config::{BackendKind, StorageConfig};
use std::sync::Arc;

/// Pick the storage backend for this process.
///
/// The durable store is tried first when configured; if it cannot be
/// reached or initialized the in-memory store takes its place and a warning
/// is logged. Callers never see the failure.
pub async fn select_backend(config: &StorageConfig, dimensions: usize) -> Arc<dyn StorageBackend> {
    match config.backend {
        BackendKind::Memory => Arc::new(MemoryStore::new(dimensions)),
        BackendKind::Matrixone => {
            match MatrixOneStore::connect(&config.matrixone, dimensions).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    tracing::warn!(
                        "MatrixOne unavailable, falling back to in-memory storage \
                         (data will not persist): {}",
                        e
                    );
                    Arc::new(MemoryStore::new(dimensions))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VectorRecord;
    use ragvault_core::config::MatrixOneConfig;

    fn unreachable_config() -> StorageConfig {
        StorageConfig {
            backend: BackendKind::Matrixone,
            matrixone: MatrixOneConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                connect_timeout_secs: 2,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_memory_backend_when_configured() {
        let config = StorageConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        };

        let backend = select_backend(&config, 8).await;
        assert_eq!(backend.backend_name(), "memory");
        assert_eq!(backend.dimensions(), 8);
    }

    #[tokio::test]
    async fn test_unreachable_durable_store_degrades_to_memory() {
        let backend = select_backend(&unreachable_config(), 2).await;
        assert_eq!(backend.backend_name(), "memory");

        // The substitute is fully functional.
        let record = VectorRecord::new("a.md", "fallback works", vec![1.0, 0.0]);
        assert!(backend.store(&record).await.unwrap());
        let results = backend.retrieve_similar(&[1.0, 0.0], 1).await;
        assert_eq!(results[0].text, "fallback works");
    }

    #[tokio::test]
    async fn test_invalid_table_name_degrades_to_memory() {
        let mut config = unreachable_config();
        config.matrixone.table = "bad name".to_string();

        let backend = select_backend(&config, 2).await;
        assert_eq!(backend.backend_name(), "memory");
    }
}
