//! Text chunking module
//!
//! Splits documents into passages for embedding. Markdown is split on its
//! structure first; everything else on paragraph, sentence and word
//! boundaries. Sizes are in characters.

use crate::errors::IngestionError;
use ragserve_common::config::IngestionConfig;
use std::path::Path;
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 0,
        }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// Document formats the ingestion tool reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Markdown,
    PlainText,
}

impl DocumentKind {
    /// Kind by file extension (case-insensitive); `None` for anything else
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Split text into non-blank chunks of at most `chunk_size` characters
pub fn chunk_text(
    text: &str,
    kind: DocumentKind,
    config: &ChunkingConfig,
) -> Result<Vec<String>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::ChunkingError(e.to_string()))?;

    let chunks: Vec<String> = match kind {
        DocumentKind::Markdown => MarkdownSplitter::new(chunk_config)
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .collect(),
        DocumentKind::Pdf | DocumentKind::PlainText => TextSplitter::new(chunk_config)
            .chunks(text)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_string)
            .collect(),
    };

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/b.PDF")), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_path(Path::new("notes.md")), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_path(Path::new("faq.txt")), Some(DocumentKind::PlainText));
        assert_eq!(DocumentKind::from_path(Path::new("image.png")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a test sentence. ".repeat(100);
        let config = ChunkingConfig {
            chunk_size: 200,
            chunk_overlap: 0,
        };

        let chunks = chunk_text(&text, DocumentKind::PlainText, &config).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200);
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_cjk_sizes_are_characters() {
        let text = "检索增强生成把检索和生成结合起来。".repeat(40);
        let chunks = chunk_text(&text, DocumentKind::PlainText, &ChunkingConfig::default()).unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 500));
    }

    #[test]
    fn test_markdown_splits_on_sections() {
        let text = format!(
            "# Intro\n\n{}\n\n# Usage\n\n{}",
            "Intro text. ".repeat(10),
            "Usage text. ".repeat(10)
        );
        let config = ChunkingConfig {
            chunk_size: 150,
            chunk_overlap: 0,
        };

        let chunks = chunk_text(&text, DocumentKind::Markdown, &config).unwrap();
        assert!(chunks.len() >= 2);
        assert!(chunks[0].starts_with("# Intro"));
        assert!(chunks.iter().any(|c| c.starts_with("# Usage")));
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        let chunks =
            chunk_text("  \n\n \t ", DocumentKind::PlainText, &ChunkingConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_rejected() {
        let config = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        };
        let err = chunk_text("text", DocumentKind::PlainText, &config).unwrap_err();
        assert!(matches!(err, IngestionError::ChunkingError(_)));
    }
}
