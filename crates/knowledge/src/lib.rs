//! Vector storage and retrieval for retrieval-augmented generation.
//!
//! Chunks of source documents are embedded and kept in a
//! [`StorageBackend`]: the durable MatrixOne store when it is reachable, the
//! in-process [`MemoryStore`] otherwise. [`RagSystem`] drives ingestion and
//! answers similarity queries on top of whichever backend was selected.

pub mod chunker;
pub mod embeddings;
pub mod parser;
pub mod retrieval;
pub mod source;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use retrieval::RagSystem;
pub use source::{DirectoryLoader, DocumentSource};
pub use storage::{select_backend, MatrixOneStore, MemoryStore, StorageBackend};
pub use types::{
    BackendStatus, DocumentChunk, IngestStats, Metadata, QueryOptions, RetrievedChunk,
    SourceSummary, VectorRecord,
};
