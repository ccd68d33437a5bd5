use serde::{Deserialize, Serialize};

/// A bounded substring of one page's text. The page number is the
/// provenance trail; a chunk never spans pages and is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub page: u32,
}

/// One retrieval hit, produced per search call and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub content: String,
    pub page: u32,
    pub score: f32,
}

/// The pipeline's terminal output. Always well-formed: degraded and
/// fallback cases fill `answer` with a descriptive string instead of
/// surfacing an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Retrieval hits in descending score order, as returned by the index.
    pub sources: Vec<ScoredChunk>,
    /// Wall-clock seconds from search start to generation end; 0.0 on the
    /// short-circuit paths.
    pub processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}
