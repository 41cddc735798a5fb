//! In-process fallback store.
//!
//! Linear scan with exact cosine similarity. Nothing survives a restart.

use super::{cosine_similarity, rank, validate_record, StorageBackend};
use crate::types::{RetrievedChunk, SourceSummary, StoredRecord, VectorRecord};
use async_trait::async_trait;
use chrono::Utc;
use ragvault_core::AppResult;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Volatile vector store used when the durable store is unavailable.
///
/// A single mutex guards every operation. It is never held across an
/// `.await`.
#[derive(Debug)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
    dimensions: usize,
}

impl MemoryStore {
    pub fn new(dimensions: usize) -> Self {
        tracing::info!("Using in-memory vector store ({} dimensions)", dimensions);
        Self {
            records: Mutex::new(Vec::new()),
            dimensions,
        }
    }

    // Every mutation leaves the Vec consistent, so a poisoned lock is safe
    // to keep using.
    fn lock(&self) -> MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn store(&self, record: &VectorRecord) -> AppResult<bool> {
        validate_record(record, self.dimensions)?;

        let mut records = self.lock();
        let duplicate = records.iter().any(|stored| {
            stored.record.source_id == record.source_id && stored.record.content == record.content
        });
        if duplicate {
            tracing::debug!(
                "Skipping duplicate chunk for source '{}'",
                record.source_id
            );
            return Ok(false);
        }

        records.push(StoredRecord {
            record: record.clone(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn retrieve_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        let records = self.lock();
        if records.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let scored: Vec<RetrievedChunk> = records
            .iter()
            .map(|stored| {
                RetrievedChunk::new(
                    stored.record.source_id.clone(),
                    stored.record.content.clone(),
                    stored.record.metadata.clone(),
                    cosine_similarity(query_embedding, &stored.record.embedding),
                )
            })
            .collect();
        drop(records);

        let ranked = rank(scored, top_k);
        tracing::debug!(
            "Retrieved {} chunks from memory (requested top-{})",
            ranked.len(),
            top_k
        );
        ranked
    }

    async fn delete(&self, source_id: &str) -> bool {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|stored| stored.record.source_id != source_id);

        tracing::debug!(
            "Deleted {} chunks for source '{}' from memory",
            before - records.len(),
            source_id
        );
        true
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.lock().len())
    }

    async fn list_sources(&self) -> AppResult<Vec<SourceSummary>> {
        let records = self.lock();
        let mut sources: Vec<SourceSummary> = Vec::new();

        for stored in records.iter() {
            match sources
                .iter_mut()
                .find(|s| s.source_id == stored.record.source_id)
            {
                Some(summary) => summary.chunks += 1,
                None => sources.push(SourceSummary {
                    source_id: stored.record.source_id.clone(),
                    chunks: 1,
                    first_stored_at: Some(stored.created_at),
                }),
            }
        }

        Ok(sources)
    }
}
