pub mod huggingface;
pub mod openai;

pub use huggingface::{HuggingFaceEmbeddings, HuggingFaceQa};
pub use openai::{OpenAiChat, OpenAiEmbeddings};

use crate::config::{ProviderKind, Settings};
use crate::error::ConfigError;
use crate::traits::{EmbeddingProvider, LlmProvider};
use std::sync::Arc;

/// Builds the embedding backend named by the configuration. Unknown
/// provider names and missing credentials fail here, at construction.
pub fn build_embedding_provider(
    settings: &Settings,
) -> Result<Arc<dyn EmbeddingProvider>, ConfigError> {
    match settings.embedding_kind()? {
        ProviderKind::OpenAi => {
            let api_key = settings
                .openai_api_key
                .clone()
                .ok_or(ConfigError::MissingApiKey("openai_api_key"))?;
            Ok(Arc::new(OpenAiEmbeddings::new(
                api_key,
                settings.embedding_model.clone(),
            )))
        }
        ProviderKind::HuggingFace => Ok(Arc::new(HuggingFaceEmbeddings::new(
            settings.hf_api_key.clone(),
            settings.embedding_model.clone(),
        ))),
    }
}

pub fn build_llm_provider(settings: &Settings) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    match settings.llm_kind()? {
        ProviderKind::OpenAi => {
            let api_key = settings
                .openai_api_key
                .clone()
                .ok_or(ConfigError::MissingApiKey("openai_api_key"))?;
            Ok(Arc::new(OpenAiChat::new(
                api_key,
                settings.llm_model.clone(),
                settings.llm_temperature,
                settings.max_tokens,
            )))
        }
        ProviderKind::HuggingFace => Ok(Arc::new(HuggingFaceQa::new(
            settings.hf_api_key.clone(),
            settings.llm_model.clone(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_embedding_provider, build_llm_provider};
    use crate::config::Settings;
    use crate::error::ConfigError;

    #[test]
    fn unknown_embedding_provider_fails_at_construction() {
        let settings = Settings {
            embedding_provider: "cohere".to_string(),
            ..Settings::default()
        };
        let error = build_embedding_provider(&settings)
            .map(|_| ())
            .expect_err("must be rejected");
        assert!(matches!(
            error,
            ConfigError::UnknownProvider {
                kind: "embedding",
                ..
            }
        ));
    }

    #[test]
    fn openai_without_key_is_a_config_error() {
        let settings = Settings::default();
        assert!(matches!(
            build_llm_provider(&settings),
            Err(ConfigError::MissingApiKey(_))
        ));
    }

    #[test]
    fn huggingface_providers_build_without_a_key() {
        let settings = Settings {
            embedding_provider: "HuggingFace".to_string(),
            llm_provider: "huggingface".to_string(),
            ..Settings::default()
        };
        assert!(build_embedding_provider(&settings).is_ok());
        assert!(build_llm_provider(&settings).is_ok());
    }
}
