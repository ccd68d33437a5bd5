use crate::error::SearchError;
use crate::models::{ChatRole, ChatTurn};
use crate::traits::{EmbeddingProvider, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Embedding(format!(
                "openai embeddings returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        let data = parsed
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut vectors = Vec::with_capacity(data.len());
        for item in &data {
            let embedding = item
                .pointer("/embedding")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|value| value as f32)
                        .collect::<Vec<f32>>()
                })
                .ok_or_else(|| {
                    SearchError::Embedding("openai response missing embedding".to_string())
                })?;
            vectors.push(embedding);
        }

        if vectors.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors)
    }
}

pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            max_tokens,
            base_url: OPENAI_API_BASE.to_string(),
        }
    }
}

/// Prompt for grounded financial Q&A. Carries the literal context and
/// question, asks for derivations from in-context figures when the answer
/// is not stated outright, and wants the final answer first.
pub(crate) fn build_rag_prompt(question: &str, context: &str) -> String {
    format!(
        "Given the context below, answer the following question.\n\
         If the answer is not explicitly stated but enough data is available in the context \
         (such as the numbers that make up a formula), calculate it from the data provided \
         and show the working briefly in markdown.\n\
         State the final answer first, in bold, on its own line, before any explanation.\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n"
    )
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        chat_history: Option<&[ChatTurn]>,
    ) -> Result<String, SearchError> {
        let mut messages = Vec::new();
        if let Some(history) = chat_history {
            for turn in history {
                let role = match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                messages.push(json!({ "role": role, "content": turn.content }));
            }
        }
        messages.push(json!({
            "role": "user",
            "content": build_rag_prompt(question, context),
        }));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "messages": messages,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Generation(format!(
                "openai chat returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SearchError::Generation("openai response missing message content".to_string())
            })
    }
}
