//! Retrieval orchestration: ingestion and similarity queries over the
//! active storage backend.

use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::source::{DirectoryLoader, DocumentSource};
use crate::storage::{select_backend, StorageBackend};
use crate::types::{
    BackendStatus, DocumentChunk, IngestStats, QueryOptions, RetrievedChunk, SourceSummary,
    VectorRecord,
};
use ragvault_core::{AppConfig, AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Ties an embedding provider, a storage backend and a document source
/// together.
#[derive(Debug)]
pub struct RagSystem {
    embedder: Arc<dyn EmbeddingProvider>,
    backend: Arc<dyn StorageBackend>,
    source: Arc<dyn DocumentSource>,
    batch_size: usize,
}

impl RagSystem {
    /// Assemble a system from parts.
    ///
    /// The provider and backend must agree on dimensionality.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        backend: Arc<dyn StorageBackend>,
        source: Arc<dyn DocumentSource>,
        batch_size: usize,
    ) -> AppResult<Self> {
        if embedder.dimensions() != backend.dimensions() {
            return Err(AppError::Config(format!(
                "Embedding provider '{}' produces {} dimensions but the {} backend expects {}",
                embedder.provider_name(),
                embedder.dimensions(),
                backend.backend_name(),
                backend.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            backend,
            source,
            batch_size: batch_size.max(1),
        })
    }

    /// Build the provider, pick a backend and set up a directory loader from
    /// configuration.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let embedder = create_provider(&config.embedding).await?;
        let backend = select_backend(&config.storage, embedder.dimensions()).await;
        let source = Arc::new(DirectoryLoader::new(&config.ingest));

        tracing::info!(
            "RAG system ready: {} embeddings (model: {}), {} storage",
            embedder.provider_name(),
            embedder.model_name(),
            backend.backend_name()
        );

        Self::new(embedder, backend, source, config.embedding.batch_size)
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Embed and store every chunk the document source finds under
    /// `directory`.
    ///
    /// A chunk that cannot be embedded or stored is counted and skipped; it
    /// never aborts the run.
    #[tracing::instrument(skip(self), fields(backend = %self.backend.backend_name()))]
    pub async fn ingest(&self, directory: &Path) -> AppResult<IngestStats> {
        let start = Instant::now();
        let chunks = self.source.scan(directory)?;

        let mut stats = IngestStats::default();
        let mut batch: Vec<DocumentChunk> = Vec::with_capacity(self.batch_size);

        for chunk in chunks {
            batch.push(chunk);
            if batch.len() == self.batch_size {
                self.ingest_batch(&batch, &mut stats).await;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            self.ingest_batch(&batch, &mut stats).await;
        }

        stats.duration_secs = start.elapsed().as_secs_f64();
        tracing::info!(
            "Ingest of {:?} completed: {} stored, {} skipped, {} failed in {:.2}s",
            directory,
            stats.stored,
            stats.skipped,
            stats.failed,
            stats.duration_secs
        );

        Ok(stats)
    }

    async fn ingest_batch(&self, batch: &[DocumentChunk], stats: &mut IngestStats) {
        let embeddings = self.embed_batch(batch).await;

        for (chunk, embedding) in batch.iter().zip(embeddings) {
            let Some(embedding) = embedding else {
                stats.failed += 1;
                continue;
            };

            let record = VectorRecord::new(chunk.source_id.clone(), chunk.content.clone(), embedding)
                .with_metadata(chunk.metadata.clone());

            match self.backend.store(&record).await {
                Ok(true) => stats.stored += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    tracing::warn!("Rejected chunk from '{}': {}", chunk.source_id, e);
                    stats.failed += 1;
                }
            }
        }
    }

    /// One embedding per chunk, `None` where embedding failed.
    ///
    /// Tries the whole batch first and falls back to one call per chunk so a
    /// single bad input only loses itself.
    async fn embed_batch(&self, batch: &[DocumentChunk]) -> Vec<Option<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

        match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => {
                return embeddings.into_iter().map(Some).collect();
            }
            Ok(embeddings) => tracing::warn!(
                "Embedding batch returned {} vectors for {} texts, retrying one by one",
                embeddings.len(),
                texts.len()
            ),
            Err(e) => tracing::warn!(
                "Embedding batch of {} failed, retrying one by one: {}",
                texts.len(),
                e
            ),
        }

        let mut embeddings = Vec::with_capacity(batch.len());
        for chunk in batch {
            match self.embedder.embed(&chunk.content).await {
                Ok(embedding) => embeddings.push(Some(embedding)),
                Err(e) => {
                    tracing::warn!("Failed to embed chunk from '{}': {}", chunk.source_id, e);
                    embeddings.push(None);
                }
            }
        }
        embeddings
    }

    /// Retrieve the chunks most similar to `text`.
    ///
    /// Results are ordered by descending score. Any `threshold` other than
    /// `0.0` drops results scoring below it, negative values included.
    pub async fn answer_context(
        &self,
        text: &str,
        top_k: usize,
        threshold: f32,
    ) -> AppResult<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(text).await?;

        if query_embedding.len() != self.backend.dimensions() {
            return Err(AppError::InvalidInput(format!(
                "Query embedding has {} dimensions, backend expects {}",
                query_embedding.len(),
                self.backend.dimensions()
            )));
        }

        let mut results = self.backend.retrieve_similar(&query_embedding, top_k).await;
        let retrieved = results.len();
        if threshold != 0.0 {
            results.retain(|chunk| chunk.score >= threshold);
        }

        tracing::debug!(
            "Query matched {} chunks ({} above threshold {:.2})",
            retrieved,
            results.len(),
            threshold
        );

        Ok(results)
    }

    pub async fn query(&self, text: &str, options: QueryOptions) -> AppResult<Vec<RetrievedChunk>> {
        self.answer_context(text, options.top_k, options.threshold)
            .await
    }

    /// Remove every chunk of `source_id`. `false` when the backend failed.
    pub async fn delete_source(&self, source_id: &str) -> bool {
        let deleted = self.backend.delete(source_id).await;
        if deleted {
            tracing::info!("Deleted source '{}'", source_id);
        }
        deleted
    }

    /// Sources currently held by the backend, in order of first storage.
    pub async fn sources(&self) -> AppResult<Vec<SourceSummary>> {
        let sources = self.backend.list_sources().await?;
        tracing::debug!("Backend holds {} sources", sources.len());
        Ok(sources)
    }

    pub async fn status(&self) -> AppResult<BackendStatus> {
        Ok(BackendStatus {
            backend: self.backend.backend_name().to_string(),
            dimensions: self.backend.dimensions(),
            records: self.backend.count().await?,
        })
    }

    /// Release backend resources. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.backend.close().await;
        tracing::debug!("RAG system shut down");
    }
}
