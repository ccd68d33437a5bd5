use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a single ingestion job. Jobs run detached, so these
/// are reported and dropped, never retried.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("pdf extraction failed for {}: {details}", .path.display())]
    Extraction { path: PathBuf, details: String },

    #[error("no extractable text found in {}", .0.display())]
    EmptyDocument(PathBuf),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("generation request failed: {0}")]
    Generation(String),

    #[error("index persistence failed: {0}")]
    Persist(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Rejected configuration. Raised once at startup, never at first use.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} provider: {value}")]
    UnknownProvider { kind: &'static str, value: String },

    #[error("invalid chunking config: {0}")]
    InvalidChunking(String),

    #[error("missing api key: {0}")]
    MissingApiKey(&'static str),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
