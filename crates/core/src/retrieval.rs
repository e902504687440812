use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{error, info};

use crate::error::RetrieveError;
use crate::expansion::QueryExpander;
use crate::models::RetrievedChunk;
use crate::store::{PointFilter, SearchHit};
use crate::traits::{EmbeddingClient, VectorStore};

/// Hits kept per expanded query.
pub const TOP_K_RESULTS: usize = 3;

/// Chunk cap for whole-document context.
pub const SUMMARY_CHUNK_LIMIT: usize = 30;

/// Phrases that flip a question into a whole-document request.
pub const SUMMARIZATION_KEYWORDS: &[&str] = &[
    "summarize",
    "summary",
    "overview",
    "gist",
    "main points",
    "key points",
    "in short",
    "in brief",
    "what is this about",
    "what's this about",
    "tell me about this file",
    "give me a summary",
    "can you summarize",
];

/// Decides whether a query asks for the whole document instead of targeted
/// passages.
pub type ModeClassifier = fn(&str) -> bool;

/// Case-insensitive substring match against [`SUMMARIZATION_KEYWORDS`].
pub fn is_summary_request(query: &str) -> bool {
    let lowered = query.to_lowercase();
    SUMMARIZATION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Fetches chat context from stored chunks. Failures never reach the caller:
/// a broken store or embedder degrades to an empty context.
pub struct RetrievalEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    expander: QueryExpander,
    classifier: ModeClassifier,
    collection: String,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        expander: QueryExpander,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            expander,
            classifier: is_summary_request,
            collection: collection.into(),
        }
    }

    pub fn with_classifier(mut self, classifier: ModeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Context for one question against the user's selected documents. With
    /// no documents selected nothing is searched and nothing is returned.
    pub async fn retrieve(
        &self,
        query: &str,
        user_id: &str,
        file_ids: &[String],
    ) -> Vec<RetrievedChunk> {
        if file_ids.is_empty() {
            return Vec::new();
        }

        match self.search_context(query, user_id, file_ids).await {
            Ok(chunks) => chunks,
            Err(retrieve_error) => {
                error!(
                    user_id,
                    error = %retrieve_error,
                    "context retrieval failed, returning no chunks"
                );
                Vec::new()
            }
        }
    }

    async fn search_context(
        &self,
        query: &str,
        user_id: &str,
        file_ids: &[String],
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        let filter = PointFilter::documents(user_id, file_ids);
        let summary_request = (self.classifier)(query);
        info!(query, summary_request, "context search");

        if summary_request {
            self.whole_document_context(&filter).await
        } else {
            self.similarity_context(query, &filter).await
        }
    }

    /// Up to [`SUMMARY_CHUNK_LIMIT`] chunks in document order, full payloads
    /// attached.
    async fn whole_document_context(
        &self,
        filter: &PointFilter,
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        let points = self
            .store
            .scroll_points(&self.collection, filter, SUMMARY_CHUNK_LIMIT, true)
            .await?;

        let mut payloads: Vec<_> = points.into_iter().filter_map(|point| point.payload).collect();
        payloads.sort_by_key(|payload| payload.chunk_index);

        Ok(payloads
            .into_iter()
            .map(|payload| RetrievedChunk {
                text: payload.text.clone(),
                original_filename: payload.original_filename.clone(),
                payload: Some(payload),
            })
            .collect())
    }

    /// Expansion fan-out with first-seen-wins dedup on `(file_id,
    /// chunk_index)`. Hits without those keys, or with empty text, are
    /// dropped.
    async fn similarity_context(
        &self,
        query: &str,
        filter: &PointFilter,
    ) -> Result<Vec<RetrievedChunk>, RetrieveError> {
        let queries = self.expander.expand(query).await;
        let searches = queries
            .iter()
            .map(|expanded| self.single_query_hits(expanded, filter));
        let per_query_hits = try_join_all(searches).await?;

        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        for hit in per_query_hits.into_iter().flatten() {
            let SearchHit {
                file_id: Some(file_id),
                chunk_index: Some(chunk_index),
                text: Some(text),
                original_filename,
                ..
            } = hit
            else {
                continue;
            };
            if text.is_empty() || !seen.insert((file_id, chunk_index)) {
                continue;
            }

            chunks.push(RetrievedChunk {
                text,
                original_filename: original_filename.unwrap_or_default(),
                payload: None,
            });
        }

        info!(unique_chunks = chunks.len(), "retrieved context");
        Ok(chunks)
    }

    async fn single_query_hits(
        &self,
        query: &str,
        filter: &PointFilter,
    ) -> Result<Vec<SearchHit>, RetrieveError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .search_points(&self.collection, &vector, filter, TOP_K_RESULTS)
            .await?;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{is_summary_request, RetrievalEngine};
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::{ChatError, StoreError};
    use crate::expansion::QueryExpander;
    use crate::llm::{ChatMessage, ChatOptions};
    use crate::models::ChunkPayload;
    use crate::store::{
        CollectionInfo, PointFilter, ScrolledPoint, SearchHit, StoredPoint,
    };
    use crate::stores::InMemoryVectorStore;
    use crate::traits::{ChatModel, EmbeddingClient, VectorStore};
    use chrono::{TimeZone, Utc};

    const DIMS: usize = 16;

    fn embedder() -> Arc<HashedNgramEmbedder> {
        Arc::new(HashedNgramEmbedder { dimensions: DIMS })
    }

    async fn seed_chunk(
        store: &InMemoryVectorStore,
        id: &str,
        user_id: &str,
        file_id: &str,
        chunk_index: u64,
        text: &str,
    ) {
        let vector = embedder().embed(text).await.unwrap();
        store
            .upsert_points(
                "docs",
                vec![StoredPoint {
                    id: id.to_string(),
                    vector,
                    payload: ChunkPayload {
                        file_id: file_id.to_string(),
                        user_id: user_id.to_string(),
                        user_name: "Dana".to_string(),
                        collection_name: "Specs".to_string(),
                        original_filename: format!("{file_id}.pdf"),
                        timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                        chunk_index,
                        text: text.to_string(),
                    },
                }],
            )
            .await
            .unwrap();
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.create_collection("docs", DIMS).await.unwrap();
        store
    }

    fn engine(store: Arc<InMemoryVectorStore>) -> RetrievalEngine {
        RetrievalEngine::new(store, embedder(), QueryExpander::disabled(), "docs")
    }

    #[test]
    fn summary_phrases_are_recognized_case_insensitively() {
        assert!(is_summary_request("Can you SUMMARIZE this?"));
        assert!(is_summary_request("what's this about?"));
        assert!(is_summary_request("Give me the key points please"));
        assert!(!is_summary_request("how do I vent the pump?"));
    }

    #[tokio::test]
    async fn no_selected_documents_means_no_retrieval_at_all() {
        struct UnreachableStore;

        #[async_trait]
        impl VectorStore for UnreachableStore {
            async fn get_collection(
                &self,
                _name: &str,
            ) -> Result<Option<CollectionInfo>, StoreError> {
                panic!("store must not be contacted");
            }

            async fn create_collection(
                &self,
                _name: &str,
                _vector_size: usize,
            ) -> Result<(), StoreError> {
                panic!("store must not be contacted");
            }

            async fn delete_collection(&self, _name: &str) -> Result<(), StoreError> {
                panic!("store must not be contacted");
            }

            async fn create_payload_index(
                &self,
                _name: &str,
                _field: &str,
            ) -> Result<(), StoreError> {
                panic!("store must not be contacted");
            }

            async fn upsert_points(
                &self,
                _name: &str,
                _points: Vec<StoredPoint>,
            ) -> Result<(), StoreError> {
                panic!("store must not be contacted");
            }

            async fn search_points(
                &self,
                _name: &str,
                _vector: &[f32],
                _filter: &PointFilter,
                _limit: usize,
            ) -> Result<Vec<SearchHit>, StoreError> {
                panic!("store must not be contacted");
            }

            async fn scroll_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
                _limit: usize,
                _with_payload: bool,
            ) -> Result<Vec<ScrolledPoint>, StoreError> {
                panic!("store must not be contacted");
            }

            async fn delete_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
            ) -> Result<(), StoreError> {
                panic!("store must not be contacted");
            }
        }

        let engine = RetrievalEngine::new(
            Arc::new(UnreachableStore),
            embedder(),
            QueryExpander::disabled(),
            "docs",
        );

        let chunks = engine.retrieve("anything", "user-1", &[]).await;

        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn similarity_search_is_scoped_to_the_user_and_their_files() {
        let store = seeded_store().await;
        seed_chunk(&store, "a", "user-1", "file-a", 0, "hydraulic pump pressure limits").await;
        seed_chunk(&store, "b", "user-1", "file-a", 1, "electrical wiring diagram overview notes").await;
        seed_chunk(&store, "c", "user-2", "file-a", 0, "hydraulic pump pressure limits").await;
        seed_chunk(&store, "d", "user-1", "file-b", 0, "unrelated corrosion tables").await;

        let engine = engine(store);
        let chunks = engine
            .retrieve(
                "hydraulic pump pressure limits",
                "user-1",
                &["file-a".to_string()],
            )
            .await;

        assert_eq!(chunks.len(), 2, "only user-1 chunks of file-a qualify");
        assert_eq!(chunks[0].text, "hydraulic pump pressure limits");
        assert!(chunks.iter().all(|chunk| chunk.payload.is_none()));
        assert!(chunks.iter().all(|chunk| chunk.original_filename == "file-a.pdf"));
    }

    #[tokio::test]
    async fn fanned_out_queries_do_not_duplicate_chunks() {
        struct ExpandingChat;

        #[async_trait]
        impl ChatModel for ExpandingChat {
            async fn invoke(
                &self,
                _messages: &[ChatMessage],
                _options: ChatOptions,
            ) -> Result<String, ChatError> {
                Ok(r#"["hydraulic pump", "pump pressure", "pressure limits"]"#.to_string())
            }
        }

        let store = seeded_store().await;
        seed_chunk(&store, "a", "user-1", "file-a", 0, "hydraulic pump pressure limits").await;
        seed_chunk(&store, "b", "user-1", "file-a", 1, "hydraulic pump maintenance interval").await;

        let engine = RetrievalEngine::new(
            store,
            embedder(),
            QueryExpander::new(Arc::new(ExpandingChat)),
            "docs",
        );

        let chunks = engine
            .retrieve("hydraulic pump", "user-1", &["file-a".to_string()])
            .await;

        assert_eq!(chunks.len(), 2, "three queries over two chunks still dedupe");
    }

    #[tokio::test]
    async fn summary_requests_return_chunks_in_document_order() {
        let store = seeded_store().await;
        seed_chunk(&store, "x", "user-1", "file-a", 2, "closing remarks").await;
        seed_chunk(&store, "y", "user-1", "file-a", 0, "introduction").await;
        seed_chunk(&store, "z", "user-1", "file-a", 1, "operating data").await;

        let engine = engine(store);
        let chunks = engine
            .retrieve("give me a summary", "user-1", &["file-a".to_string()])
            .await;

        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["introduction", "operating data", "closing remarks"]);
        assert!(chunks.iter().all(|chunk| chunk.payload.is_some()));
    }

    #[tokio::test]
    async fn custom_classifier_forces_the_summary_path() {
        let store = seeded_store().await;
        seed_chunk(&store, "y", "user-1", "file-a", 0, "introduction").await;
        seed_chunk(&store, "x", "user-1", "file-a", 1, "closing remarks").await;

        let engine = engine(store).with_classifier(|_| true);
        let chunks = engine
            .retrieve("where is the relief valve?", "user-1", &["file-a".to_string()])
            .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "introduction");
    }

    #[tokio::test]
    async fn store_failures_degrade_to_an_empty_context() {
        struct FailingStore;

        fn failure() -> StoreError {
            StoreError::BackendResponse {
                backend: "test".to_string(),
                details: "down".to_string(),
            }
        }

        #[async_trait]
        impl VectorStore for FailingStore {
            async fn get_collection(
                &self,
                _name: &str,
            ) -> Result<Option<CollectionInfo>, StoreError> {
                Err(failure())
            }

            async fn create_collection(
                &self,
                _name: &str,
                _vector_size: usize,
            ) -> Result<(), StoreError> {
                Err(failure())
            }

            async fn delete_collection(&self, _name: &str) -> Result<(), StoreError> {
                Err(failure())
            }

            async fn create_payload_index(
                &self,
                _name: &str,
                _field: &str,
            ) -> Result<(), StoreError> {
                Err(failure())
            }

            async fn upsert_points(
                &self,
                _name: &str,
                _points: Vec<StoredPoint>,
            ) -> Result<(), StoreError> {
                Err(failure())
            }

            async fn search_points(
                &self,
                _name: &str,
                _vector: &[f32],
                _filter: &PointFilter,
                _limit: usize,
            ) -> Result<Vec<SearchHit>, StoreError> {
                Err(failure())
            }

            async fn scroll_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
                _limit: usize,
                _with_payload: bool,
            ) -> Result<Vec<ScrolledPoint>, StoreError> {
                Err(failure())
            }

            async fn delete_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
            ) -> Result<(), StoreError> {
                Err(failure())
            }
        }

        let engine = RetrievalEngine::new(
            Arc::new(FailingStore),
            embedder(),
            QueryExpander::disabled(),
            "docs",
        );

        let targeted = engine
            .retrieve("relief valve", "user-1", &["file-a".to_string()])
            .await;
        let summary = engine
            .retrieve("summarize this", "user-1", &["file-a".to_string()])
            .await;

        assert!(targeted.is_empty());
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn hits_without_dedup_keys_or_text_are_dropped() {
        struct CraftedStore;

        #[async_trait]
        impl VectorStore for CraftedStore {
            async fn get_collection(
                &self,
                _name: &str,
            ) -> Result<Option<CollectionInfo>, StoreError> {
                Ok(None)
            }

            async fn create_collection(
                &self,
                _name: &str,
                _vector_size: usize,
            ) -> Result<(), StoreError> {
                Ok(())
            }

            async fn delete_collection(&self, _name: &str) -> Result<(), StoreError> {
                Ok(())
            }

            async fn create_payload_index(
                &self,
                _name: &str,
                _field: &str,
            ) -> Result<(), StoreError> {
                Ok(())
            }

            async fn upsert_points(
                &self,
                _name: &str,
                _points: Vec<StoredPoint>,
            ) -> Result<(), StoreError> {
                Ok(())
            }

            async fn search_points(
                &self,
                _name: &str,
                _vector: &[f32],
                _filter: &PointFilter,
                _limit: usize,
            ) -> Result<Vec<SearchHit>, StoreError> {
                Ok(vec![
                    SearchHit {
                        score: 0.9,
                        file_id: Some("file-a".to_string()),
                        chunk_index: Some(0),
                        text: Some("kept".to_string()),
                        original_filename: Some("file-a.pdf".to_string()),
                    },
                    SearchHit {
                        score: 0.8,
                        file_id: None,
                        chunk_index: Some(1),
                        text: Some("no file id".to_string()),
                        original_filename: None,
                    },
                    SearchHit {
                        score: 0.7,
                        file_id: Some("file-a".to_string()),
                        chunk_index: None,
                        text: Some("no index".to_string()),
                        original_filename: None,
                    },
                    SearchHit {
                        score: 0.6,
                        file_id: Some("file-a".to_string()),
                        chunk_index: Some(2),
                        text: Some(String::new()),
                        original_filename: None,
                    },
                ])
            }

            async fn scroll_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
                _limit: usize,
                _with_payload: bool,
            ) -> Result<Vec<ScrolledPoint>, StoreError> {
                Ok(Vec::new())
            }

            async fn delete_points(
                &self,
                _name: &str,
                _filter: &PointFilter,
            ) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let engine = RetrievalEngine::new(
            Arc::new(CraftedStore),
            embedder(),
            QueryExpander::disabled(),
            "docs",
        );

        let chunks = engine
            .retrieve("relief valve", "user-1", &["file-a".to_string()])
            .await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "kept");
        assert_eq!(chunks[0].original_filename, "file-a.pdf");
    }
}
