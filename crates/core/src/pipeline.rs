use crate::error::SearchError;
use crate::index::VectorIndex;
use crate::models::{Answer, ChatTurn, ScoredChunk};
use crate::traits::LlmProvider;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub const NO_RELEVANT_CONTENT: &str =
    "Sorry, I could not find any relevant content in the documents.";
pub const NO_CONTEXT_FOUND: &str = "Sorry, no context found.";

/// Rough character budget per token when bounding the context window.
const APPROX_CHARS_PER_TOKEN: usize = 5;

/// Turns a question into a scored, sourced answer: retrieve, assemble a
/// bounded context, generate. The final backstop of the system; nothing
/// escapes it as an error.
pub struct AnswerPipeline {
    index: Arc<VectorIndex>,
    llm: Arc<dyn LlmProvider>,
    max_tokens: usize,
}

impl AnswerPipeline {
    pub fn new(index: Arc<VectorIndex>, llm: Arc<dyn LlmProvider>, max_tokens: usize) -> Self {
        Self {
            index,
            llm,
            max_tokens,
        }
    }

    /// Always returns a well-formed `Answer`. Search or generation failures
    /// become a degraded answer with empty sources and zero processing
    /// time; the short-circuit paths also report zero processing time.
    pub async fn answer(&self, question: &str, chat_history: Option<&[ChatTurn]>) -> Answer {
        let started = Instant::now();
        match self.try_answer(question, chat_history, started).await {
            Ok(answer) => answer,
            Err(failure) => {
                error!(error = %failure, "answer pipeline failed");
                Answer {
                    answer: format!("System error: {failure}"),
                    sources: Vec::new(),
                    processing_time: 0.0,
                }
            }
        }
    }

    async fn try_answer(
        &self,
        question: &str,
        chat_history: Option<&[ChatTurn]>,
        started: Instant,
    ) -> Result<Answer, SearchError> {
        let sources = self.index.search(question, None).await?;
        if sources.is_empty() {
            // Only possible when the index holds zero records; low-relevance
            // results are already handled by the index's threshold fallback.
            warn!("no document chunk retrieved; returning fallback answer");
            return Ok(Answer {
                answer: NO_RELEVANT_CONTENT.to_string(),
                sources: Vec::new(),
                processing_time: 0.0,
            });
        }

        let context = self.build_context(&sources);
        if context.trim().is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_FOUND.to_string(),
                sources: Vec::new(),
                processing_time: 0.0,
            });
        }

        let answer = self.llm.generate(question, &context, chat_history).await?;
        let processing_time = started.elapsed().as_secs_f64();
        info!(
            sources = sources.len(),
            seconds = processing_time,
            "question answered"
        );

        Ok(Answer {
            answer,
            sources,
            processing_time,
        })
    }

    /// Joins chunk texts in result order and truncates to the prompt
    /// budget. The truncation is a hard suffix cut, not word-aware; cost
    /// and latency control win over a clean final word.
    fn build_context(&self, sources: &[ScoredChunk]) -> String {
        let context = sources
            .iter()
            .map(|source| source.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let limit = self.max_tokens * APPROX_CHARS_PER_TOKEN;
        if context.chars().count() <= limit {
            context
        } else {
            context.chars().take(limit).collect()
        }
    }
}
