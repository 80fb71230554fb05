//! Index maintenance
//!
//! The three operations behind the CLI: create the index, clear it, and
//! ingest a directory of documents into it.

use crate::chunker::{chunk_text, ChunkingConfig, DocumentKind};
use crate::errors::IngestionError;
use crate::pdf::extract_text_from_pdf;
use async_trait::async_trait;
use ragserve_common::{
    config::IngestionConfig,
    errors::Result as AppResult,
    search::{AzureSearchClient, IndexDocument, IndexSchema},
    Embedder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Most documents listed by one clear pass
pub const CLEAR_LIST_LIMIT: usize = 1000;

/// Write side of the search index
#[async_trait]
pub trait IndexStore: Send + Sync {
    fn index_name(&self) -> &str;
    fn vector_field(&self) -> &str;
    async fn create_or_update_index(&self, schema: &IndexSchema) -> AppResult<()>;
    async fn upload_documents(&self, documents: &[IndexDocument]) -> AppResult<usize>;
    async fn list_document_ids(&self, limit: usize) -> AppResult<Vec<String>>;
    async fn delete_documents(&self, ids: &[String]) -> AppResult<usize>;
}

#[async_trait]
impl IndexStore for AzureSearchClient {
    fn index_name(&self) -> &str {
        AzureSearchClient::index_name(self)
    }

    fn vector_field(&self) -> &str {
        AzureSearchClient::vector_field(self)
    }

    async fn create_or_update_index(&self, schema: &IndexSchema) -> AppResult<()> {
        AzureSearchClient::create_or_update_index(self, schema).await
    }

    async fn upload_documents(&self, documents: &[IndexDocument]) -> AppResult<usize> {
        AzureSearchClient::upload_documents(self, documents).await
    }

    async fn list_document_ids(&self, limit: usize) -> AppResult<Vec<String>> {
        AzureSearchClient::list_document_ids(self, limit).await
    }

    async fn delete_documents(&self, ids: &[String]) -> AppResult<usize> {
        AzureSearchClient::delete_documents(self, ids).await
    }
}

/// Outcome of an ingest run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_skipped: usize,
    pub chunks_uploaded: usize,
}

pub struct Indexer<S: IndexStore> {
    store: S,
    embedder: Arc<dyn Embedder>,
    config: IngestionConfig,
}

impl<S: IndexStore> Indexer<S> {
    pub fn new(store: S, embedder: Arc<dyn Embedder>, config: IngestionConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Create the index, or update its definition in place
    pub async fn create_index(&self) -> Result<(), IngestionError> {
        let schema = IndexSchema::standard(
            self.store.index_name(),
            self.embedder.dimension(),
            self.store.vector_field(),
        );
        self.store.create_or_update_index(&schema).await?;
        info!(
            index = self.store.index_name(),
            dimension = self.embedder.dimension(),
            "Index created or updated"
        );
        Ok(())
    }

    /// Delete every listed document; returns how many were deleted
    pub async fn clear_index(&self) -> Result<usize, IngestionError> {
        let ids = self.store.list_document_ids(CLEAR_LIST_LIMIT).await?;
        if ids.is_empty() {
            info!(index = self.store.index_name(), "Index is already empty");
            return Ok(0);
        }
        info!(count = ids.len(), "Deleting documents");

        let mut deleted = 0;
        for (batch_no, batch) in ids.chunks(self.config.delete_batch_size.max(1)).enumerate() {
            deleted += self.store.delete_documents(batch).await?;
            info!(batch = batch_no + 1, size = batch.len(), "Deleted batch");
        }

        info!(deleted, "Index cleared");
        Ok(deleted)
    }

    /// Chunk, embed and upload every supported file directly in `data_dir`
    #[instrument(skip(self), fields(data_dir = %data_dir.display()))]
    pub async fn ingest(&self, data_dir: &Path) -> Result<IngestReport, IngestionError> {
        let files = scan_directory(data_dir)?;
        let mut report = IngestReport {
            files_found: files.len(),
            ..IngestReport::default()
        };
        info!(files = files.len(), "Found files");

        let chunking = ChunkingConfig::from(&self.config);
        let mut documents = Vec::new();
        for (path, kind) in files {
            match self.prepare_file(&path, kind, &chunking).await {
                Ok(mut docs) => documents.append(&mut docs),
                Err(e) if e.is_file_local() => {
                    warn!(file = %path.display(), error = %e, "Skipping file");
                    report.files_skipped += 1;
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Ingestion aborted");
                    return Err(e);
                }
            }
        }

        if documents.is_empty() {
            warn!("No documents to upload; add PDF, MD or TXT files to the data directory");
            return Ok(report);
        }

        info!(chunks = documents.len(), "Uploading chunks");
        for batch in documents.chunks(self.config.upload_batch_size.max(1)) {
            report.chunks_uploaded += self.store.upload_documents(batch).await?;
            debug!(uploaded = report.chunks_uploaded, "Uploaded batch");
        }

        info!(
            files = report.files_found,
            skipped = report.files_skipped,
            chunks = report.chunks_uploaded,
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn prepare_file(
        &self,
        path: &Path,
        kind: DocumentKind,
        chunking: &ChunkingConfig,
    ) -> Result<Vec<IndexDocument>, IngestionError> {
        info!(file = %path.display(), "Processing file");
        let text = load_document(path, kind)?;
        let chunks = chunk_text(&text, kind, chunking)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed_batch(&chunks).await?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(content, vector)| IndexDocument {
                id: Uuid::new_v4().to_string(),
                content,
                vector,
                source: source.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .collect())
    }
}

/// Supported files directly inside `dir`, sorted by name
pub fn scan_directory(dir: &Path) -> Result<Vec<(PathBuf, DocumentKind)>, IngestionError> {
    if !dir.is_dir() {
        return Err(IngestionError::DirectoryNotFound(dir.display().to_string()));
    }

    Ok(WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let kind = DocumentKind::from_path(e.path())?;
            Some((e.into_path(), kind))
        })
        .collect())
}

/// Read a document's text
pub fn load_document(path: &Path, kind: DocumentKind) -> Result<String, IngestionError> {
    match kind {
        DocumentKind::Pdf => extract_text_from_pdf(path),
        DocumentKind::Markdown | DocumentKind::PlainText => Ok(std::fs::read_to_string(path)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_common::errors::AppError;
    use ragserve_common::testing::FakeEmbedder;
    use std::fs;
    use std::sync::Mutex;

    /// Index held in memory
    #[derive(Default)]
    struct MemoryStore {
        schema: Mutex<Option<IndexSchema>>,
        documents: Mutex<Vec<IndexDocument>>,
        upload_batches: Mutex<Vec<usize>>,
        delete_batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl IndexStore for MemoryStore {
        fn index_name(&self) -> &str {
            "docs"
        }

        fn vector_field(&self) -> &str {
            "contentVector"
        }

        async fn create_or_update_index(&self, schema: &IndexSchema) -> AppResult<()> {
            *self.schema.lock().unwrap() = Some(schema.clone());
            Ok(())
        }

        async fn upload_documents(&self, documents: &[IndexDocument]) -> AppResult<usize> {
            self.upload_batches.lock().unwrap().push(documents.len());
            self.documents.lock().unwrap().extend_from_slice(documents);
            Ok(documents.len())
        }

        async fn list_document_ids(&self, limit: usize) -> AppResult<Vec<String>> {
            Ok(self
                .documents
                .lock()
                .unwrap()
                .iter()
                .take(limit)
                .map(|d| d.id.clone())
                .collect())
        }

        async fn delete_documents(&self, ids: &[String]) -> AppResult<usize> {
            self.delete_batches.lock().unwrap().push(ids.len());
            self.documents.lock().unwrap().retain(|d| !ids.contains(&d.id));
            Ok(ids.len())
        }
    }

    fn indexer(config: IngestionConfig) -> Indexer<MemoryStore> {
        Indexer::new(MemoryStore::default(), Arc::new(FakeEmbedder::new(6)), config)
    }

    #[test]
    fn test_scan_is_flat_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "C").unwrap();

        let files = scan_directory(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
        assert_eq!(files[1].1, DocumentKind::Markdown);
    }

    #[test]
    fn test_missing_directory() {
        let err = scan_directory(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, IngestionError::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_ingest_uploads_chunks_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("guide.txt"), "Retrieval first. ".repeat(60)).unwrap();
        fs::write(dir.path().join("notes.md"), "# Notes\n\nShort note.").unwrap();
        fs::write(dir.path().join("broken.pdf"), b"not a pdf").unwrap();

        let indexer = indexer(IngestionConfig {
            chunk_size: 200,
            upload_batch_size: 3,
            ..IngestionConfig::default()
        });
        let report = indexer.ingest(dir.path()).await.unwrap();

        assert_eq!(report.files_found, 3);
        assert_eq!(report.files_skipped, 1);

        let docs = indexer.store.documents.lock().unwrap().clone();
        assert_eq!(report.chunks_uploaded, docs.len());
        assert!(docs.len() > 3);
        assert!(docs.iter().all(|d| d.vector.len() == 6));
        assert!(docs.iter().all(|d| d.content.chars().count() <= 200));
        assert!(docs.iter().any(|d| d.source == "notes.md"));
        assert!(docs.iter().all(|d| chrono::DateTime::parse_from_rfc3339(&d.created_at).is_ok()));

        let batches = indexer.store.upload_batches.lock().unwrap().clone();
        assert!(batches.iter().all(|&b| b <= 3));
    }

    #[tokio::test]
    async fn test_ingest_empty_directory_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = indexer(IngestionConfig::default());

        let report = indexer.ingest(dir.path()).await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert!(indexer.store.upload_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_ingest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "some text").unwrap();
        fs::write(dir.path().join("b.txt"), "more text").unwrap();
        let indexer = Indexer::new(
            MemoryStore::default(),
            Arc::new(FakeEmbedder::failing("backend down")),
            IngestionConfig::default(),
        );

        let err = indexer.ingest(dir.path()).await.unwrap_err();
        assert!(matches!(err, IngestionError::Service(AppError::Embedding { .. })));
        assert!(err.to_string().contains("backend down"));
        assert!(indexer.store.upload_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_index_uses_embedder_dimension() {
        let indexer = indexer(IngestionConfig::default());
        indexer.create_index().await.unwrap();

        let schema = indexer.store.schema.lock().unwrap().clone().unwrap();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["name"], "docs");
        assert_eq!(json["fields"][4]["dimensions"], 6);
    }

    #[tokio::test]
    async fn test_clear_index_deletes_in_batches() {
        let indexer = indexer(IngestionConfig {
            delete_batch_size: 100,
            ..IngestionConfig::default()
        });
        let docs: Vec<IndexDocument> = (0..250)
            .map(|i| IndexDocument {
                id: format!("doc-{}", i),
                content: "c".to_string(),
                vector: vec![0.0; 6],
                source: "s.txt".to_string(),
                created_at: "2026-01-01T00:00:00Z".to_string(),
            })
            .collect();
        indexer.store.upload_documents(&docs).await.unwrap();

        assert_eq!(indexer.clear_index().await.unwrap(), 250);
        assert_eq!(
            *indexer.store.delete_batches.lock().unwrap(),
            vec![100, 100, 50]
        );
        assert_eq!(indexer.clear_index().await.unwrap(), 0);
    }

    #[test]
    fn test_service_errors_convert() {
        let err: IngestionError = AppError::Search {
            message: "search.api_key is not configured".to_string(),
        }
        .into();
        assert!(err.to_string().contains("search.api_key"));
    }
}
