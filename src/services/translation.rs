use std::sync::Arc;

use thiserror::Error;

use crate::models::language_name;
use crate::models::message::DEFAULT_LANG;
use crate::providers::{CompletionRequest, LlmProvider, ProviderError};

pub const DEFAULT_TRANSLATE_MAX_TOKENS: u32 = 500;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation failed: {0}")]
    Provider(#[from] ProviderError),
}

pub struct TranslationGateway {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    default_source_lang: String,
}

impl TranslationGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: DEFAULT_TRANSLATE_MAX_TOKENS,
            default_source_lang: DEFAULT_LANG.to_string(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_default_source_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_source_lang = lang.into();
        self
    }

    /// Translate `text` into `target_lang`. Blank input returns an empty
    /// string without calling the provider.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let source_lang = source_lang.unwrap_or(&self.default_source_lang);
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: system_prompt(source_lang, target_lang),
            user_content: text.to_string(),
            max_tokens: Some(self.max_tokens),
        };

        let output = self.provider.complete(request).await?;
        let translated = output.trim();
        if translated.is_empty() {
            tracing::warn!(
                provider = self.provider.name(),
                "empty translation returned, keeping original text"
            );
            return Ok(text.to_string());
        }
        Ok(translated.to_string())
    }
}

pub fn system_prompt(source_lang: &str, target_lang: &str) -> String {
    format!(
        "You are a medical translator. Translate the following text from {} to {}. \
         Preserve medical terminology where appropriate. \
         Output only the translation, no explanations.",
        language_name(source_lang),
        language_name(target_lang)
    )
}
