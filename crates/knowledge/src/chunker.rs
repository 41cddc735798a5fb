//! Text chunking with configurable size and overlap.
//!
//! Sizes are in characters. Splitting is semantic: `text-splitter` keeps
//! paragraphs, then lines, sentences and words together whenever they fit
//! in a chunk.

use ragvault_core::{AppError, AppResult};
use text_splitter::{ChunkConfig, TextSplitter};

/// A slice of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// 0-based index within the document
    pub position: u32,
    /// Byte offset of the chunk start in the source text
    pub start: usize,
    /// Byte offset one past the chunk end
    pub end: usize,
    /// Trimmed chunk text, never empty
    pub text: String,
}

/// Chunk text into segments of at most `chunk_size` characters, with up to
/// `overlap` characters shared between neighbours.
///
/// Fails when `overlap` is not smaller than `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<TextChunk>> {
    if text.trim().is_empty() || chunk_size == 0 {
        return Ok(Vec::new());
    }

    let config = ChunkConfig::new(chunk_size)
        .with_overlap(overlap)
        .map_err(|e| {
            AppError::Config(format!(
                "Invalid chunking (size: {}, overlap: {}): {}",
                chunk_size, overlap, e
            ))
        })?;
    let splitter = TextSplitter::new(config);

    let chunks: Vec<TextChunk> = splitter
        .chunk_indices(text)
        .filter(|(_, piece)| !piece.trim().is_empty())
        .enumerate()
        .map(|(position, (start, piece))| TextChunk {
            position: position as u32,
            start,
            end: start + piece.len(),
            text: piece.to_string(),
        })
        .collect();

    tracing::debug!(
        "Chunked {} bytes into {} chunks (size: {}, overlap: {})",
        text.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
