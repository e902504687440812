use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunking::TextChunker;
use crate::error::IngestError;
use crate::extractor::extract_text;
use crate::models::{ChunkPayload, DocumentUpload, IngestOutcome};
use crate::store::{PointFilter, StoredPoint};
use crate::traits::{EmbeddingClient, VectorStore};

/// All `.pdf` files under a folder, recursively, in stable path order.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();

    files.sort_unstable();
    files
}

/// Turns uploaded documents into stored chunk points: duplicate check,
/// text extraction, chunking, embedding, upsert.
pub struct IngestionPipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    chunker: TextChunker,
    collection: String,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        chunker: TextChunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker,
            collection: collection.into(),
        }
    }

    /// Ingests one uploaded document. A document whose `(file_id, user_id)`
    /// pair already has stored points is skipped without re-embedding.
    ///
    /// The duplicate check and the write are not atomic; two concurrent
    /// uploads of the same document can both pass the check and store their
    /// chunks twice. Retrieval stays correct because hits are deduplicated
    /// on `(file_id, chunk_index)`.
    pub async fn ingest(&self, upload: DocumentUpload) -> Result<IngestOutcome, IngestError> {
        let filter = PointFilter::document(&upload.user_id, &upload.file_id);
        let existing = self
            .store
            .scroll_points(&self.collection, &filter, 1, false)
            .await?;
        if !existing.is_empty() {
            info!(
                file_id = %upload.file_id,
                user_id = %upload.user_id,
                "document already ingested, skipping"
            );
            return Ok(IngestOutcome::SkippedDuplicate);
        }

        let text = extract_text(&upload.content, &upload.original_filename)?;
        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            warn!(
                file_id = %upload.file_id,
                filename = %upload.original_filename,
                "document has no extractable text, skipping"
            );
            return Ok(IngestOutcome::SkippedEmpty);
        }

        let vectors = self.embedder.embed_batch(&chunks).await?;

        let points: Vec<StoredPoint> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, vector))| StoredPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: ChunkPayload {
                    file_id: upload.file_id.clone(),
                    user_id: upload.user_id.clone(),
                    user_name: upload.user_name.clone(),
                    collection_name: upload.collection_name.clone(),
                    original_filename: upload.original_filename.clone(),
                    timestamp: upload.timestamp,
                    chunk_index: index as u64,
                    text,
                },
            })
            .collect();

        let written = points.len();
        self.store.upsert_points(&self.collection, points).await?;
        info!(
            file_id = %upload.file_id,
            chunks = written,
            "document ingested"
        );
        Ok(IngestOutcome::Ingested(written))
    }

    /// Drops every stored chunk of the listed documents. An empty list is a
    /// no-op rather than an unfiltered delete.
    pub async fn delete_documents(&self, file_ids: &[String]) -> Result<(), IngestError> {
        if file_ids.is_empty() {
            warn!("no file ids given for deletion, nothing to do");
            return Ok(());
        }

        self.store
            .delete_points(&self.collection, &PointFilter::file_ids(file_ids))
            .await?;
        info!(documents = file_ids.len(), "deleted stored chunks");
        Ok(())
    }
}
