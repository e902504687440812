use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_chat_core::{
    discover_pdf_files, generate_answer, generate_title, ChatModel, ChunkingConfig,
    CollectionManager, DocumentUpload, EmbeddingClient, HashedNgramEmbedder, HttpChatModel,
    HttpEmbeddingClient, IngestOutcome, IngestionPipeline, QdrantStore, QueryExpander,
    RetrievalEngine, TextChunker, TokenCounter, VectorStore, EMBEDDING_DIMENSIONS,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Storage collection holding the chunk points
    #[arg(long, default_value = "doc_chat_chunks")]
    collection: String,

    /// OpenAI-compatible API root for embeddings and chat
    #[arg(long, env = "LLM_BASE_URL", default_value = "http://localhost:1234/v1")]
    llm_base_url: String,

    /// API key for the LLM endpoint
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Embedding model id; without one a deterministic offline embedder is used
    #[arg(long, env = "EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Chat model id; without one ask, title and query expansion are disabled
    #[arg(long, env = "CHAT_MODEL")]
    chat_model: Option<String>,

    /// Path to a tokenizer.json vocabulary for exact token counts
    #[arg(long, env = "TOKENIZER_FILE")]
    tokenizer_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF file, or every PDF under a folder.
    Ingest {
        /// PDF file or folder to walk for PDFs.
        #[arg(long)]
        path: PathBuf,
        /// Owner of the uploaded documents.
        #[arg(long)]
        user_id: String,
        /// Display name stored with every chunk.
        #[arg(long)]
        user_name: String,
        /// Logical collection label stored with every chunk.
        #[arg(long, default_value = "General")]
        collection_name: String,
        /// Explicit file id; only valid when ingesting a single PDF.
        #[arg(long)]
        file_id: Option<String>,
    },
    /// Retrieve context chunks for a question.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        user_id: String,
        /// Documents to search; repeat for several.
        #[arg(long = "file-id")]
        file_ids: Vec<String>,
    },
    /// Retrieve context and generate a grounded answer.
    Ask {
        #[arg(long)]
        question: String,
        #[arg(long)]
        user_id: String,
        /// Documents to search; repeat for several.
        #[arg(long = "file-id")]
        file_ids: Vec<String>,
    },
    /// Generate a chat session title from the first message.
    Title {
        #[arg(long)]
        message: String,
    },
    /// Delete every stored chunk of the listed documents.
    Delete {
        #[arg(long = "file-id", required = true)]
        file_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store: Arc<dyn VectorStore> =
        Arc::new(QdrantStore::new(&cli.qdrant_url, cli.qdrant_api_key.clone())?);

    let embedder: Arc<dyn EmbeddingClient> = match &cli.embedding_model {
        Some(model) => Arc::new(HttpEmbeddingClient::new(
            &cli.llm_base_url,
            cli.llm_api_key.clone(),
            model,
            EMBEDDING_DIMENSIONS,
        )),
        None => {
            warn!("no embedding model configured, using the offline hashed embedder");
            Arc::new(HashedNgramEmbedder::default())
        }
    };

    let chat: Option<Arc<dyn ChatModel>> = cli.chat_model.as_deref().map(|model| {
        Arc::new(HttpChatModel::new(
            &cli.llm_base_url,
            cli.llm_api_key.clone(),
            model,
        )) as Arc<dyn ChatModel>
    });
    if chat.is_none() {
        warn!("no chat model configured; ask, title and query expansion are disabled");
    }

    let expander = match &chat {
        Some(chat) => QueryExpander::new(chat.clone()),
        None => QueryExpander::disabled(),
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        collection = %cli.collection,
        "doc-chat boot"
    );

    match cli.command {
        Command::Ingest {
            path,
            user_id,
            user_name,
            collection_name,
            file_id,
        } => {
            let files = if path.is_file() {
                vec![path.clone()]
            } else {
                discover_pdf_files(&path)
            };
            if files.is_empty() {
                bail!("no pdf files found in {}", path.display());
            }
            if file_id.is_some() && files.len() > 1 {
                bail!("--file-id requires a single pdf path, found {} files", files.len());
            }

            let manager =
                CollectionManager::new(store.clone(), &cli.collection, embedder.dimensions());
            manager.ensure_collection().await?;

            let counter = TokenCounter::load(cli.tokenizer_file.as_deref());
            let chunker = TextChunker::new(counter, ChunkingConfig::default())?;
            let pipeline =
                IngestionPipeline::new(store.clone(), embedder.clone(), chunker, &cli.collection);

            let total = files.len();
            let mut ingested = 0usize;
            for file in files {
                let filename = file
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.display().to_string());
                let content = tokio::fs::read(&file).await?;
                let upload = DocumentUpload {
                    file_id: file_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
                    user_id: user_id.clone(),
                    user_name: user_name.clone(),
                    collection_name: collection_name.clone(),
                    original_filename: filename.clone(),
                    timestamp: Utc::now(),
                    content,
                };
                let document_id = upload.file_id.clone();

                match pipeline.ingest(upload).await {
                    Ok(IngestOutcome::Ingested(chunks)) => {
                        ingested += 1;
                        println!("{filename}: {chunks} chunks ingested (file_id {document_id})");
                    }
                    Ok(IngestOutcome::SkippedDuplicate) => {
                        println!("{filename}: already ingested, skipped");
                    }
                    Ok(IngestOutcome::SkippedEmpty) => {
                        println!("{filename}: no extractable text, skipped");
                    }
                    Err(error) => {
                        warn!(file = %file.display(), error = %error, "ingestion failed");
                        println!("{filename}: failed ({error})");
                    }
                }
            }
            println!("{ingested} of {total} files ingested");
        }
        Command::Search {
            query,
            user_id,
            file_ids,
        } => {
            let engine = RetrievalEngine::new(store, embedder, expander, &cli.collection);
            let chunks = engine.retrieve(&query, &user_id, &file_ids).await;

            if chunks.is_empty() {
                println!("no matching context");
            }
            for (index, chunk) in chunks.iter().enumerate() {
                let source = if chunk.original_filename.is_empty() {
                    "unknown"
                } else {
                    chunk.original_filename.as_str()
                };
                println!("[{}] {source}", index + 1);
                println!("{}", chunk.text);
            }
        }
        Command::Ask {
            question,
            user_id,
            file_ids,
        } => {
            let Some(chat) = chat else {
                bail!("ask requires --chat-model (or CHAT_MODEL)");
            };

            let engine = RetrievalEngine::new(store, embedder, expander, &cli.collection);
            let chunks = engine.retrieve(&question, &user_id, &file_ids).await;
            let answer = generate_answer(chat.as_ref(), &question, &[], &chunks).await?;

            println!("{}", answer.text);
            if !answer.files_used.is_empty() {
                println!("sources: {}", answer.files_used.join(", "));
            }
        }
        Command::Title { message } => {
            let Some(chat) = chat else {
                bail!("title requires --chat-model (or CHAT_MODEL)");
            };

            let title = generate_title(chat.as_ref(), &message).await?;
            println!("{title}");
        }
        Command::Delete { file_ids } => {
            let counter = TokenCounter::load(cli.tokenizer_file.as_deref());
            let chunker = TextChunker::new(counter, ChunkingConfig::default())?;
            let pipeline = IngestionPipeline::new(store, embedder, chunker, &cli.collection);

            pipeline.delete_documents(&file_ids).await?;
            println!("deleted chunks for {} document(s)", file_ids.len());
        }
    }

    Ok(())
}
