//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON object carried alongside a chunk. Opaque to the storage layer.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key every retrieved chunk carries, set to its `source_id`.
pub const SOURCE_KEY: &str = "source";

/// The unit of storage: one chunk of one source document and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Originating document (e.g. file path); shared by all its chunks
    pub source_id: String,

    /// Chunk text, non-empty
    pub content: String,

    /// Embedding of `content`, length `D` of the backend
    pub embedding: Vec<f32>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    pub fn new(
        source_id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            content: content.into(),
            embedding,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A record held by the in-memory store.
#[derive(Debug, Clone)]
pub(crate) struct StoredRecord {
    pub record: VectorRecord,
    pub created_at: DateTime<Utc>,
}

/// One ranked retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk text
    pub text: String,

    /// Originating document
    pub source_id: String,

    /// Stored metadata plus `"source"`
    pub metadata: Metadata,

    /// Cosine similarity to the query, in [-1, 1]
    pub score: f32,
}

impl RetrievedChunk {
    /// Build a result, stamping `"source"` into the metadata.
    pub fn new(source_id: String, text: String, mut metadata: Metadata, score: f32) -> Self {
        metadata.insert(
            SOURCE_KEY.to_string(),
            serde_json::Value::String(source_id.clone()),
        );
        Self {
            text,
            source_id,
            metadata,
            score,
        }
    }
}

/// A chunk produced by a document source, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub source_id: String,
    pub content: String,
    pub metadata: Metadata,
}

/// Options for a retrieval query.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Number of chunks to retrieve
    pub top_k: usize,

    /// Results scoring below this are dropped. Exactly `0.0` disables
    /// filtering, so negative similarities survive the default.
    pub threshold: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.0,
        }
    }
}

/// Statistics from an ingest operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestStats {
    /// Chunks newly written to the backend
    pub stored: u32,

    /// Chunks the backend did not write (duplicates or transient failures)
    pub skipped: u32,

    /// Chunks lost to embedding failures or rejected records
    pub failed: u32,

    /// Duration in seconds
    pub duration_secs: f64,
}

impl IngestStats {
    /// Every chunk the source produced, whatever happened to it.
    pub fn total(&self) -> u32 {
        self.stored + self.skipped + self.failed
    }
}

/// Snapshot of the active backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    /// "matrixone" or "memory"
    pub backend: String,

    pub dimensions: usize,

    pub records: usize,
}

/// One source document held by a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSummary {
    pub source_id: String,

    /// Stored chunks of this source
    pub chunks: usize,

    /// When the earliest surviving chunk was stored, if the backend knows
    pub first_stored_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieved_chunk_stamps_source() {
        let mut metadata = Metadata::new();
        metadata.insert("page".to_string(), serde_json::json!(3));

        let chunk = RetrievedChunk::new("docs/a.md".to_string(), "text".to_string(), metadata, 0.5);
        assert_eq!(chunk.metadata["source"], "docs/a.md");
        assert_eq!(chunk.metadata["page"], 3);
    }

    #[test]
    fn test_ingest_stats_total() {
        let stats = IngestStats {
            stored: 3,
            skipped: 2,
            failed: 1,
            duration_secs: 0.5,
        };
        assert_eq!(stats.total(), 6);
    }

    #[test]
    fn test_query_options_default() {
        let options = QueryOptions::default();
        assert_eq!(options.top_k, 5);
        assert_eq!(options.threshold, 0.0);
    }
}
