use crate::error::SearchError;
use crate::models::ChatTurn;
use async_trait::async_trait;

/// Turns text into fixed-dimension vectors for similarity comparison. The
/// numeric quality of the vectors is the backend's concern, not the core's.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns exactly one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;
}

/// Synthesizes an answer from a question and a retrieved context window.
/// Implementations must include the literal question and context in their
/// prompt and ask for the final answer to be stated up front.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        chat_history: Option<&[ChatTurn]>,
    ) -> Result<String, SearchError>;
}
