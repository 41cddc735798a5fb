//! Vector storage abstraction for knowledge chunks.
//!
//! Two backends implement [`StorageBackend`]: the durable [`MatrixOneStore`]
//! and the in-process [`MemoryStore`]. [`select_backend`] picks one at
//! startup and the rest of the system only sees the trait object.

pub mod matrixone;
pub mod memory;
pub mod selector;

pub use matrixone::MatrixOneStore;
pub use memory::MemoryStore;
pub use selector::select_backend;

use crate::types::{RetrievedChunk, SourceSummary, VectorRecord};
use async_trait::async_trait;
use ragvault_core::{AppError, AppResult};

/// Trait for vector storage backends.
///
/// Only caller contract violations surface as errors. Transport or query
/// failures are logged inside the backend and reported as `false` or an
/// empty result list.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Backend identifier ("matrixone", "memory")
    fn backend_name(&self) -> &str;

    /// Embedding dimensionality every record must have
    fn dimensions(&self) -> usize;

    /// Insert a record unless `(source_id, content)` is already stored.
    ///
    /// Returns `Ok(true)` when the record was written and `Ok(false)` when it
    /// was a duplicate or the write failed.
    async fn store(&self, record: &VectorRecord) -> AppResult<bool>;

    /// Return the `top_k` records most similar to `query_embedding`.
    ///
    /// Ordered by descending cosine similarity; equal scores keep insertion
    /// order.
    async fn retrieve_similar(&self, query_embedding: &[f32], top_k: usize)
        -> Vec<RetrievedChunk>;

    /// Remove every record of `source_id`. `false` only on operational failure.
    async fn delete(&self, source_id: &str) -> bool;

    /// Number of stored records.
    async fn count(&self) -> AppResult<usize>;

    /// Every stored source with its chunk count, in order of first storage.
    async fn list_sources(&self) -> AppResult<Vec<SourceSummary>>;

    /// Release held resources. Idempotent.
    async fn close(&self) {}
}

/// Reject records that break the storage contract.
pub(crate) fn validate_record(record: &VectorRecord, dimensions: usize) -> AppResult<()> {
    if record.content.trim().is_empty() {
        return Err(AppError::InvalidInput(format!(
            "Chunk content for source '{}' is empty",
            record.source_id
        )));
    }

    if record.embedding.len() != dimensions {
        return Err(AppError::InvalidInput(format!(
            "Embedding dimension mismatch: expected {}, got {}",
            dimensions,
            record.embedding.len()
        )));
    }

    if record.embedding.iter().any(|v| !v.is_finite()) {
        return Err(AppError::InvalidInput(format!(
            "Embedding for source '{}' contains non-finite values",
            record.source_id
        )));
    }

    Ok(())
}

/// Calculate cosine similarity between two vectors.
///
/// Zero-norm vectors (and mismatched lengths) score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Sort by descending score and keep the first `top_k`.
///
/// The sort is stable, so callers that pass results in insertion order get
/// insertion-order tie breaking.
pub(crate) fn rank(mut results: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn result(text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk::new("src".to_string(), text.to_string(), Metadata::new(), score)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let ranked = rank(
            vec![
                result("low", 0.1),
                result("tie-first", 0.5),
                result("top", 0.9),
                result("tie-second", 0.5),
            ],
            3,
        );

        let texts: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["top", "tie-first", "tie-second"]);
    }

    #[test]
    fn test_validate_record() {
        assert!(validate_record(&VectorRecord::new("a", "text", vec![1.0, 0.0]), 2).is_ok());

        let empty = validate_record(&VectorRecord::new("a", "   ", vec![1.0, 0.0]), 2);
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));

        let wrong_dim = validate_record(&VectorRecord::new("a", "text", vec![1.0]), 2);
        assert!(matches!(wrong_dim, Err(AppError::InvalidInput(_))));

        let nan = validate_record(&VectorRecord::new("a", "text", vec![f32::NAN, 0.0]), 2);
        assert!(matches!(nan, Err(AppError::InvalidInput(_))));
    }
}
