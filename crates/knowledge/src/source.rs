//! Document sources feeding ingestion.

use crate::chunker::chunk_text;
use crate::parser::parse_file;
use crate::types::{DocumentChunk, Metadata};
use ragvault_core::config::IngestConfig;
use ragvault_core::{AppError, AppResult};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::Path;
use walkdir::WalkDir;

/// Lazy stream of chunks produced by a source.
pub type ChunkIter = Box<dyn Iterator<Item = DocumentChunk> + Send>;

/// Yields the chunks of every document under a directory.
///
/// Each call to [`scan`](DocumentSource::scan) starts over from the
/// beginning, so a source can be scanned any number of times.
pub trait DocumentSource: Send + Sync + std::fmt::Debug {
    fn scan(&self, directory: &Path) -> AppResult<ChunkIter>;
}

/// Recursive directory walker over supported text and Word files.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    extensions: Vec<String>,
    chunk_size: usize,
    chunk_overlap: usize,
    min_content_length: usize,
}

impl DirectoryLoader {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            min_content_length: config.min_content_length,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|known| known.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Parse and chunk one file. Unreadable or too-short documents yield
    /// nothing.
    fn load(&self, path: &Path) -> Vec<DocumentChunk> {
        let parsed = match parse_file(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                return Vec::new();
            }
        };

        if parsed.text.chars().count() < self.min_content_length {
            tracing::debug!(
                "Skipping {:?}: {} chars of content, minimum is {}",
                path,
                parsed.text.chars().count(),
                self.min_content_length
            );
            return Vec::new();
        }

        let source_id = path.to_string_lossy().to_string();
        let chunks = match chunk_text(&parsed.text, self.chunk_size, self.chunk_overlap) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", path, e);
                return Vec::new();
            }
        };
        tracing::debug!("Loaded {:?}: {} chunks", path, chunks.len());

        chunks
            .into_iter()
            .map(|chunk| {
                let mut metadata = Metadata::new();
                metadata.insert("position".to_string(), json!(chunk.position));
                metadata.insert("start".to_string(), json!(chunk.start));
                metadata.insert("end".to_string(), json!(chunk.end));
                metadata.insert("chunk_size".to_string(), json!(chunk.text.chars().count()));
                metadata.insert(
                    "content_type".to_string(),
                    json!(parsed.content_type.as_str()),
                );
                metadata.insert("content_hash".to_string(), json!(content_hash(&chunk.text)));

                DocumentChunk {
                    source_id: source_id.clone(),
                    content: chunk.text,
                    metadata,
                }
            })
            .collect()
    }
}

impl DocumentSource for DirectoryLoader {
    fn scan(&self, directory: &Path) -> AppResult<ChunkIter> {
        if !directory.is_dir() {
            return Err(AppError::Ingest(format!(
                "Not a directory: {:?}",
                directory
            )));
        }

        let loader = self.clone();
        let files = WalkDir::new(directory)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());

        Ok(Box::new(
            files
                .filter(move |entry| loader.accepts(entry.path()))
                .flat_map({
                    let loader = self.clone();
                    move |entry| loader.load(entry.path())
                }),
        ))
    }
}

/// SHA-256 of chunk text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> DirectoryLoader {
        DirectoryLoader::new(&IngestConfig::default())
    }

    #[test]
    fn test_scan_walks_recursively_and_filters_extensions() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested/deeper")).unwrap();
        fs::write(temp.path().join("a.txt"), "Alpha document with enough text.").unwrap();
        fs::write(
            temp.path().join("nested/deeper/b.md"),
            "# Beta\n\nBeta document body text.",
        )
        .unwrap();
        fs::write(temp.path().join("image.png"), "not really an image at all").unwrap();

        let chunks: Vec<DocumentChunk> = loader().scan(temp.path()).unwrap().collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].source_id.ends_with("a.txt"));
        assert!(chunks[1].source_id.ends_with("b.md"));
        assert_eq!(chunks[1].metadata["content_type"], "markdown");
    }

    #[test]
    fn test_scan_extracts_word_documents() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let temp = TempDir::new().unwrap();
        let mut writer =
            zip::ZipWriter::new(fs::File::create(temp.path().join("minutes.docx")).unwrap());
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(
                br#"<w:document xmlns:w="urn:w"><w:body><w:p><w:r><w:t>Board meeting minutes for March.</w:t></w:r></w:p></w:body></w:document>"#,
            )
            .unwrap();
        writer.finish().unwrap();

        let chunks: Vec<DocumentChunk> = loader().scan(temp.path()).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Board meeting minutes for March.");
        assert_eq!(chunks[0].metadata["content_type"], "docx");
    }

    #[test]
    fn test_short_documents_are_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("tiny.txt"), "  hi \n\n ").unwrap();
        fs::write(temp.path().join("empty.md"), "").unwrap();

        assert_eq!(loader().scan(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_chunk_metadata() {
        let temp = TempDir::new().unwrap();
        let text = "Sentence number one. ".repeat(60);
        fs::write(temp.path().join("long.txt"), &text).unwrap();

        let chunks: Vec<DocumentChunk> = loader().scan(temp.path()).unwrap().collect();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata["position"], i);
            assert_eq!(chunk.metadata["content_hash"], content_hash(&chunk.content));
            assert_eq!(chunk.metadata["chunk_size"], chunk.content.chars().count());
        }
    }

    #[test]
    fn test_scan_is_restartable() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("doc.txt"), "Restartable source content.").unwrap();

        let loader = loader();
        let first: Vec<DocumentChunk> = loader.scan(temp.path()).unwrap().collect();
        let second: Vec<DocumentChunk> = loader.scan(temp.path()).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp = TempDir::new().unwrap();
        let result = loader().scan(&temp.path().join("nope"));
        assert!(matches!(result, Err(AppError::Ingest(_))));
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("Hello, world!");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash("Hello, world!"));
        assert_ne!(hash, content_hash("Different text"));
    }
}
