use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use finqa_core::{
    build_embedding_provider, build_llm_provider, discover_pdf_files, AnswerPipeline,
    DocumentIngestor, IngestQueue, JobState, Settings, TextSplitter, VectorIndex,
    DEFAULT_BATCH_SIZE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "finqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = 1_000)]
    chunk_size: usize,

    /// Characters of context carried between consecutive chunks.
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Embedding backend: openai or huggingface.
    #[arg(long, default_value = "openai", env = "FINQA_EMBEDDING_PROVIDER")]
    embedding_provider: String,

    #[arg(long, default_value = "text-embedding-3-small", env = "FINQA_EMBEDDING_MODEL")]
    embedding_model: String,

    /// LLM backend: openai or huggingface.
    #[arg(long, default_value = "openai", env = "FINQA_LLM_PROVIDER")]
    llm_provider: String,

    #[arg(long, default_value = "gpt-4o-mini", env = "FINQA_LLM_MODEL")]
    llm_model: String,

    #[arg(long, default_value_t = 0.0)]
    llm_temperature: f32,

    /// Response token budget; also bounds the retrieved context window.
    #[arg(long, default_value_t = 1_000)]
    max_tokens: usize,

    /// Number of chunks retrieved per question.
    #[arg(long, default_value_t = 5)]
    retrieval_k: usize,

    /// Minimum relevance score; lower-scoring hits are dropped unless the
    /// filter would empty the result set.
    #[arg(long, default_value_t = 0.7)]
    similarity_threshold: f32,

    /// Directory holding the persisted index.
    #[arg(long, default_value = "vector_db", env = "FINQA_VECTOR_DB_PATH")]
    vector_db_path: PathBuf,

    /// Directory uploaded PDFs are kept in.
    #[arg(long, default_value = "uploads", env = "FINQA_UPLOAD_DIR")]
    upload_dir: PathBuf,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "HF_API_KEY", hide_env_values = true)]
    hf_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one PDF, or every PDF under a folder, into the index.
    Ingest {
        /// PDF file or folder of PDFs.
        #[arg(long)]
        path: PathBuf,
    },
    /// Ask a question over the indexed documents.
    Ask {
        /// The question to answer.
        #[arg(long)]
        question: String,
    },
    /// List every stored chunk with its id, page, and a text preview.
    Chunks,
    /// Delete stored chunks by id.
    Delete {
        /// Chunk ids to remove.
        #[arg(long, required = true)]
        id: Vec<Uuid>,
    },
    /// List uploaded PDFs and the current index size.
    Documents,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            embedding_provider: self.embedding_provider.clone(),
            embedding_model: self.embedding_model.clone(),
            llm_provider: self.llm_provider.clone(),
            llm_model: self.llm_model.clone(),
            llm_temperature: self.llm_temperature,
            max_tokens: self.max_tokens,
            retrieval_k: self.retrieval_k,
            similarity_threshold: self.similarity_threshold,
            vector_db_path: self.vector_db_path.clone(),
            upload_dir: self.upload_dir.clone(),
            openai_api_key: self.openai_api_key.clone(),
            hf_api_key: self.hf_api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    // Bad provider names and chunking parameters fail here, before any
    // backend is touched.
    settings
        .validate()
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let embedder = build_embedding_provider(&settings)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let index = Arc::new(
        VectorIndex::open(
            settings.vector_db_path.clone(),
            embedder,
            settings.retrieval_k,
            settings.similarity_threshold,
        )
        .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "finqa boot"
    );

    match cli.command {
        Command::Ingest { path } => {
            let files = if path.is_dir() {
                discover_pdf_files(&path)
            } else {
                vec![path.clone()]
            };
            if files.is_empty() {
                anyhow::bail!("no pdf files found under {}", path.display());
            }

            let ingestor = Arc::new(DocumentIngestor::new(TextSplitter::new(
                settings.chunk_size,
                settings.chunk_overlap,
            )));
            let queue = IngestQueue::spawn(ingestor, Arc::clone(&index), DEFAULT_BATCH_SIZE);

            let mut job_ids = Vec::with_capacity(files.len());
            for file in &files {
                job_ids.push(queue.submit(file).await);
            }

            loop {
                let statuses = queue.statuses().await;
                if statuses.iter().all(|status| status.state.is_settled()) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
            }

            let mut failed = 0usize;
            for status in queue.statuses().await {
                match status.state {
                    JobState::Done => println!(
                        "ingested {} ({} chunks)",
                        status.path.display(),
                        status.chunk_count.unwrap_or(0)
                    ),
                    JobState::Failed => {
                        failed += 1;
                        println!(
                            "failed {}: {}",
                            status.path.display(),
                            status.error.unwrap_or_default()
                        );
                    }
                    JobState::Pending | JobState::Running => {}
                }
            }

            println!(
                "{} chunks in index after ingesting {} file(s), {} failed",
                index.count().await,
                files.len(),
                failed
            );
        }
        Command::Ask { question } => {
            let llm = build_llm_provider(&settings)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let pipeline = AnswerPipeline::new(Arc::clone(&index), llm, settings.max_tokens);

            let answer = pipeline.answer(&question, None).await;

            println!("{}", answer.answer);
            println!();
            for source in &answer.sources {
                println!("[page {}] score={:.4}", source.page, source.score);
            }
            println!("answered in {:.2}s", answer.processing_time);
        }
        Command::Chunks => {
            let stored = index.all().await;
            for chunk in &stored {
                let preview: String = chunk.content.chars().take(80).collect();
                println!("{} page={} {}", chunk.id, chunk.page, preview);
            }
            println!("total_count={}", stored.len());
        }
        Command::Delete { id } => {
            index
                .delete(&id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{} chunks remain", index.count().await);
        }
        Command::Documents => {
            let files = discover_pdf_files(&settings.upload_dir);
            for file in &files {
                let modified: Option<DateTime<Utc>> = std::fs::metadata(file)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .map(DateTime::from);
                match modified {
                    Some(time) => {
                        println!("{} uploaded_at={}", file.display(), time.to_rfc3339())
                    }
                    None => println!("{}", file.display()),
                }
            }
            println!(
                "{} document(s), {} chunks indexed",
                files.len(),
                index.count().await
            );
        }
    }

    Ok(())
}
