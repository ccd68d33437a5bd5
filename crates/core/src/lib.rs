pub mod chunking;
pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod traits;

pub use chunking::{clean, TextSplitter};
pub use config::{ProviderKind, Settings};
pub use error::{ConfigError, IngestError, SearchError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use index::{IndexedChunk, StoredChunk, VectorIndex, DEFAULT_BATCH_SIZE};
pub use ingest::{discover_pdf_files, DocumentIngestor};
pub use jobs::{IngestQueue, JobState, JobStatus};
pub use models::{Answer, ChatRole, ChatTurn, Chunk, ScoredChunk};
pub use pipeline::{AnswerPipeline, NO_CONTEXT_FOUND, NO_RELEVANT_CONTENT};
pub use providers::{
    build_embedding_provider, build_llm_provider, HuggingFaceEmbeddings, HuggingFaceQa, OpenAiChat,
    OpenAiEmbeddings,
};
pub use traits::{EmbeddingProvider, LlmProvider};
