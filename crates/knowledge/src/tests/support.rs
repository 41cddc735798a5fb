//! Test doubles for the orchestrator's collaborators.

use crate::embeddings::EmbeddingProvider;
use crate::source::{ChunkIter, DocumentSource};
use crate::types::{DocumentChunk, Metadata};
use ragvault_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// Returns fixed vectors for known texts and the zero vector otherwise.
#[derive(Debug, Default)]
pub struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
}

impl FixedProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimensions,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FixedProvider {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimensions])
            })
            .collect())
    }
}

/// Fails any call that includes a text containing "poison".
#[derive(Debug)]
pub struct PoisonProvider {
    pub dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for PoisonProvider {
    fn provider_name(&self) -> &str {
        "poison"
    }

    fn model_name(&self) -> &str {
        "poison"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("poison")) {
            return Err(AppError::Embedding("poisoned input".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; self.dimensions];
                v[t.len() % self.dimensions] = 1.0;
                v
            })
            .collect())
    }
}

/// Hands back the same fixed chunks for any directory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    chunks: Vec<DocumentChunk>,
}

impl StaticSource {
    pub fn new(chunks: &[(&str, &str)]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|(source_id, content)| DocumentChunk {
                    source_id: source_id.to_string(),
                    content: content.to_string(),
                    metadata: Metadata::new(),
                })
                .collect(),
        }
    }
}

impl DocumentSource for StaticSource {
    fn scan(&self, _directory: &Path) -> AppResult<ChunkIter> {
        Ok(Box::new(self.chunks.clone().into_iter()))
    }
}
