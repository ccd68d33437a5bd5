use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Backends an embedding or LLM capability can be served by. Selection
/// happens once at construction; call sites never branch on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    HuggingFace,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "huggingface" => Ok(Self::HuggingFace),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => write!(formatter, "openai"),
            Self::HuggingFace => write!(formatter, "huggingface"),
        }
    }
}

/// Every knob the core consumes. Each field has a validated default;
/// `validate` runs at startup so bad provider names fail fast.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub max_tokens: usize,
    pub retrieval_k: usize,
    pub similarity_threshold: f32,
    pub vector_db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub hf_api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            llm_provider: "openai".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.0,
            max_tokens: 1_000,
            retrieval_k: 5,
            similarity_threshold: 0.7,
            vector_db_path: PathBuf::from("vector_db"),
            upload_dir: PathBuf::from("uploads"),
            openai_api_key: None,
            hf_api_key: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding_kind()?;
        self.llm_kind()?;

        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunking(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunking(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }

    pub fn embedding_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.embedding_provider
            .parse()
            .map_err(|value| ConfigError::UnknownProvider {
                kind: "embedding",
                value,
            })
    }

    pub fn llm_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.llm_provider
            .parse()
            .map_err(|value| ConfigError::UnknownProvider { kind: "llm", value })
    }
}
