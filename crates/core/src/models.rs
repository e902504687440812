use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_id: String,
    pub user_id: String,
    pub user_name: String,
    pub collection_name: String,
    pub original_filename: String,
    pub timestamp: DateTime<Utc>,
    pub content: Vec<u8>,
}

/// Payload stored with every point. Field names are part of the stored
/// schema and must not change without a collection migration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    pub file_id: String,
    pub user_id: String,
    pub user_name: String,
    pub collection_name: String,
    pub original_filename: String,
    pub timestamp: DateTime<Utc>,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Chunks were embedded and written; carries the chunk count.
    Ingested(usize),
    /// Points for this `(file_id, user_id)` already exist; nothing written.
    SkippedDuplicate,
    /// The document yielded no text to index; nothing written.
    SkippedEmpty,
}

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub original_filename: String,
    /// Full stored payload, present only when the chunk came from an
    /// ordered whole-document fetch.
    pub payload: Option<ChunkPayload>,
}
