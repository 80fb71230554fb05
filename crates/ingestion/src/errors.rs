//! Ingestion tool error types

use ragserve_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("Data directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Service(#[from] AppError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestionError {
    /// Errors confined to one input file; anything else aborts the run
    pub fn is_file_local(&self) -> bool {
        matches!(
            self,
            IngestionError::PdfParseError { .. }
                | IngestionError::ChunkingError(_)
                | IngestionError::IoError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_file_errors_are_local() {
        assert!(IngestionError::PdfParseError {
            path: "a.pdf".to_string(),
            message: "bad xref".to_string(),
        }
        .is_file_local());
        assert!(IngestionError::ChunkingError("overlap".to_string()).is_file_local());
        assert!(IngestionError::from(std::io::Error::other("denied")).is_file_local());

        let backend: IngestionError = AppError::Embedding {
            message: "401 Unauthorized".to_string(),
        }
        .into();
        assert!(!backend.is_file_local());
        assert!(!IngestionError::DirectoryNotFound("data".to_string()).is_file_local());
    }
}
