use crate::error::{ChatError, EmbedError, StoreError};
use crate::llm::{ChatMessage, ChatOptions};
use crate::store::{CollectionInfo, PointFilter, ScrolledPoint, SearchHit, StoredPoint};
use async_trait::async_trait;

/// Vector store backend. Collection names are plain strings; every call is
/// scoped to one collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Metadata for an existing collection, or `None` if it does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError>;

    async fn create_collection(&self, name: &str, vector_size: usize) -> Result<(), StoreError>;

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Keyword index on a payload field. Creating an index that already
    /// exists is a no-op.
    async fn create_payload_index(&self, name: &str, field: &str) -> Result<(), StoreError>;

    async fn upsert_points(&self, name: &str, points: Vec<StoredPoint>) -> Result<(), StoreError>;

    async fn search_points(
        &self,
        name: &str,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> Result<Vec<SearchHit>, StoreError>;

    async fn scroll_points(
        &self,
        name: &str,
        filter: &PointFilter,
        limit: usize,
        with_payload: bool,
    ) -> Result<Vec<ScrolledPoint>, StoreError>;

    async fn delete_points(&self, name: &str, filter: &PointFilter) -> Result<(), StoreError>;
}

/// Text embedding backend with a fixed output dimensionality.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        if vectors.len() != 1 {
            return Err(EmbedError::MissingVector { index: 0 });
        }
        Ok(vectors.remove(0))
    }

    fn dimensions(&self) -> usize;
}

/// Chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage], options: ChatOptions)
        -> Result<String, ChatError>;
}
