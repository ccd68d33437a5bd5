use crate::error::SearchError;
use crate::models::ChatTurn;
use crate::traits::{EmbeddingProvider, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const HF_API_BASE: &str = "https://api-inference.huggingface.co";

/// The extractive QA pipeline has a small input window, so the context is
/// cropped before the call.
const QA_CONTEXT_LIMIT: usize = 2_000;

pub struct HuggingFaceEmbeddings {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl HuggingFaceEmbeddings {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: HF_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!(
                "{}/pipeline/feature-extraction/{}",
                self.base_url, self.model
            ))
            .json(&json!({ "inputs": texts, "options": { "wait_for_model": true } }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Embedding(format!(
                "huggingface feature-extraction returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        let items = parsed.as_array().ok_or_else(|| {
            SearchError::Embedding("huggingface response is not an array".to_string())
        })?;

        if items.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                items.len()
            )));
        }

        items.iter().map(parse_embedding).collect()
    }
}

/// Sentence-level models return one vector per input; token-level models
/// return a vector per token, which is mean-pooled here.
fn parse_embedding(item: &Value) -> Result<Vec<f32>, SearchError> {
    let values = item.as_array().ok_or_else(|| {
        SearchError::Embedding("huggingface embedding is not an array".to_string())
    })?;

    if values.iter().all(Value::is_number) {
        return Ok(values
            .iter()
            .filter_map(Value::as_f64)
            .map(|value| value as f32)
            .collect());
    }

    let token_vectors: Vec<Vec<f32>> = values
        .iter()
        .filter_map(Value::as_array)
        .map(|tokens| {
            tokens
                .iter()
                .filter_map(Value::as_f64)
                .map(|value| value as f32)
                .collect()
        })
        .collect();

    let dimensions = token_vectors.first().map(Vec::len).unwrap_or(0);
    if dimensions == 0 {
        return Err(SearchError::Embedding(
            "huggingface embedding has no dimensions".to_string(),
        ));
    }

    let mut pooled = vec![0f32; dimensions];
    for vector in &token_vectors {
        for (slot, value) in pooled.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    for slot in &mut pooled {
        *slot /= token_vectors.len() as f32;
    }

    Ok(pooled)
}

pub struct HuggingFaceQa {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl HuggingFaceQa {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: HF_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceQa {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        _chat_history: Option<&[ChatTurn]>,
    ) -> Result<String, SearchError> {
        let cropped: String = context.chars().take(QA_CONTEXT_LIMIT).collect();

        let mut request = self
            .client
            .post(format!("{}/models/{}", self.base_url, self.model))
            .json(&json!({
                "inputs": { "question": question, "context": cropped },
                "options": { "wait_for_model": true },
            }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Generation(format!(
                "huggingface qa returned {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/answer")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SearchError::Generation("huggingface qa response missing answer".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_embedding;
    use serde_json::json;

    #[test]
    fn sentence_level_embeddings_pass_through() {
        let vector = parse_embedding(&json!([0.1, 0.2, 0.3])).expect("flat vector parses");
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn token_level_embeddings_are_mean_pooled() {
        let vector =
            parse_embedding(&json!([[1.0, 3.0], [3.0, 5.0]])).expect("nested vectors parse");
        assert_eq!(vector, vec![2.0, 4.0]);
    }

    #[test]
    fn non_array_embedding_is_an_error() {
        assert!(parse_embedding(&json!("oops")).is_err());
    }
}
