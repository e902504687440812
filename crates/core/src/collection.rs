use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StoreError;
use crate::traits::VectorStore;

/// Payload fields that get a keyword index at collection creation. Both are
/// used in every retrieval filter.
pub const INDEXED_FIELDS: &[&str] = &["user_id", "file_id"];

const MAX_SCHEMA_REPAIRS: usize = 1;

/// Owns the collection schema: creates it on first use and recreates it when
/// the stored vector size no longer matches the embedder.
pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
    collection: String,
    vector_size: usize,
}

impl CollectionManager {
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            vector_size,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Brings the collection to the expected schema. A collection with a
    /// drifted vector size is dropped and recreated, which discards its
    /// points; repair happens at most once per call, after that the drift is
    /// reported as an error.
    pub async fn ensure_collection(&self) -> Result<(), StoreError> {
        let mut repairs = 0;
        loop {
            match self.store.get_collection(&self.collection).await? {
                None => {
                    info!(
                        collection = %self.collection,
                        vector_size = self.vector_size,
                        "creating collection"
                    );
                    self.store
                        .create_collection(&self.collection, self.vector_size)
                        .await?;
                }
                Some(found) if found.vector_size == self.vector_size => {}
                Some(found) => {
                    if repairs >= MAX_SCHEMA_REPAIRS {
                        return Err(StoreError::SchemaDrift {
                            collection: self.collection.clone(),
                            expected: self.vector_size,
                            found: found.vector_size,
                        });
                    }
                    warn!(
                        collection = %self.collection,
                        found = found.vector_size,
                        expected = self.vector_size,
                        "vector size drifted, dropping and recreating collection"
                    );
                    self.store.delete_collection(&self.collection).await?;
                    repairs += 1;
                    continue;
                }
            }

            // Index creation is a no-op on already-indexed fields, so it is
            // issued on every start, not only right after creation.
            for field in INDEXED_FIELDS {
                self.store.create_payload_index(&self.collection, field).await?;
            }
            return Ok(());
        }
    }
}
