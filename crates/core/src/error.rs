use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("collection {collection} stores {found}-dimensional vectors, expected {expected}")]
    SchemaDrift {
        collection: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend rejected request: {0}")]
    Backend(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding response has no vector for input {index}")]
    MissingVector { index: usize },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend rejected request: {0}")]
    Backend(String),

    #[error("chat response has no message content")]
    MalformedResponse,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("could not extract text from {filename}: {details}")]
    Extraction { filename: String, details: String },

    #[error("embedding request failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store request failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("embedding request failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("vector store request failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
