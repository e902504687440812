pub mod answer;
pub mod chunking;
pub mod collection;
pub mod embeddings;
pub mod error;
pub mod expansion;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod tokens;
pub mod traits;

pub use answer::{files_used, generate_answer, generate_title, GeneratedAnswer, CONTEXT_SEPARATOR};
pub use chunking::{ChunkingConfig, TextChunker, DEFAULT_CHUNK_TOKENS, DEFAULT_OVERLAP_TOKENS};
pub use collection::{CollectionManager, INDEXED_FIELDS};
pub use embeddings::{HashedNgramEmbedder, HttpEmbeddingClient, EMBEDDING_DIMENSIONS};
pub use error::{ChatError, EmbedError, IngestError, RetrieveError, StoreError};
pub use expansion::{QueryExpander, MAX_EXPANDED_QUERIES};
pub use extractor::extract_text;
pub use ingest::{discover_pdf_files, IngestionPipeline};
pub use llm::{ChatMessage, ChatOptions, HttpChatModel};
pub use models::{ChunkPayload, DocumentUpload, IngestOutcome, RetrievedChunk};
pub use retrieval::{
    is_summary_request, ModeClassifier, RetrievalEngine, SUMMARIZATION_KEYWORDS,
    SUMMARY_CHUNK_LIMIT, TOP_K_RESULTS,
};
pub use store::{
    CollectionInfo, FieldCondition, PointFilter, ScrolledPoint, SearchHit, StoredPoint,
};
pub use stores::{InMemoryVectorStore, QdrantStore};
pub use tokens::TokenCounter;
pub use traits::{ChatModel, EmbeddingClient, VectorStore};
