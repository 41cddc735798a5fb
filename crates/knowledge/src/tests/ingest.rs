//! Ingestion counting and failure isolation.

use super::support::{FixedProvider, PoisonProvider, StaticSource};
use crate::embeddings::TrigramProvider;
use crate::retrieval::RagSystem;
use crate::source::DirectoryLoader;
use crate::storage::MemoryStore;
use ragvault_core::config::IngestConfig;
use ragvault_core::AppError;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn directory_system(dimensions: usize) -> RagSystem {
    RagSystem::new(
        Arc::new(TrigramProvider::new(dimensions)),
        Arc::new(MemoryStore::new(dimensions)),
        Arc::new(DirectoryLoader::new(&IngestConfig::default())),
        2,
    )
    .unwrap()
}

#[tokio::test]
async fn test_reingest_skips_everything() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("one.txt"), "First document about vector search.").unwrap();
    fs::write(temp.path().join("two.md"), "## Second\n\nAnother document entirely.").unwrap();
    fs::write(
        temp.path().join("three.txt"),
        "A third file to make the batch boundary uneven.",
    )
    .unwrap();

    let rag = directory_system(64);

    let first = rag.ingest(temp.path()).await.unwrap();
    assert_eq!(first.stored, 3);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.failed, 0);

    let second = rag.ingest(temp.path()).await.unwrap();
    assert_eq!(second.stored, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.total(), first.total());
    assert_eq!(rag.status().await.unwrap().records, 3);
}

#[tokio::test]
async fn test_missing_directory_is_ingest_error() {
    let temp = TempDir::new().unwrap();
    let rag = directory_system(16);

    let result = rag.ingest(&temp.path().join("does-not-exist")).await;
    assert!(matches!(result, Err(AppError::Ingest(_))));
}

#[tokio::test]
async fn test_failing_embedding_only_loses_that_chunk() {
    let rag = RagSystem::new(
        Arc::new(PoisonProvider { dimensions: 4 }),
        Arc::new(MemoryStore::new(4)),
        Arc::new(StaticSource::new(&[
            ("a.md", "good one"),
            ("a.md", "poison pill"),
            ("b.md", "good two"),
        ])),
        8,
    )
    .unwrap();

    let stats = rag.ingest(Path::new("unused")).await.unwrap();
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 0);
}

#[tokio::test]
async fn test_rejected_records_count_as_failed() {
    let provider = FixedProvider::new(2)
        .with("ok", vec![1.0, 0.0])
        .with("wide", vec![1.0, 0.0, 0.0]);
    let rag = RagSystem::new(
        Arc::new(provider),
        Arc::new(MemoryStore::new(2)),
        Arc::new(StaticSource::new(&[("a.md", "ok"), ("a.md", "wide"), ("a.md", "   ")])),
        1,
    )
    .unwrap();

    let stats = rag.ingest(Path::new("unused")).await.unwrap();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn test_duplicates_within_one_run_are_skipped() {
    let provider = FixedProvider::new(2).with("same", vec![0.0, 1.0]);
    let rag = RagSystem::new(
        Arc::new(provider),
        Arc::new(MemoryStore::new(2)),
        Arc::new(StaticSource::new(&[("a.md", "same"), ("a.md", "same"), ("b.md", "same")])),
        2,
    )
    .unwrap();

    let stats = rag.ingest(Path::new("unused")).await.unwrap();
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.skipped, 1);
}
