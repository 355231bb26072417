use std::sync::Arc;

use thiserror::Error;

use crate::models::Message;
use crate::providers::{CompletionRequest, LlmProvider, ProviderError};

pub const DEFAULT_SUMMARY_MAX_TOKENS: u32 = 800;

const SYSTEM_PROMPT: &str = "You are a medical scribe. Given a doctor-patient conversation, produce a concise clinical summary. Include:
- Chief complaint / reason for visit
- Symptoms mentioned
- Diagnoses or working diagnoses
- Medications (current or prescribed)
- Follow-up actions or recommendations
Use clear headings and bullet points. Be concise.";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("summary failed: model returned no text")]
    Empty,
}

pub struct SummaryGateway {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl SummaryGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn summarize(&self, messages: &[Message]) -> Result<String, SummaryError> {
        let request = CompletionRequest {
            model: self.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_content: build_transcript(messages),
            max_tokens: Some(self.max_tokens),
        };

        let output = self.provider.complete(request).await?;
        let summary = output.trim();
        if summary.is_empty() {
            return Err(SummaryError::Empty);
        }
        Ok(summary.to_string())
    }
}

/// One `ROLE: text` line per message; the translation is appended only when
/// it differs from the original.
pub fn build_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = m.role.as_str().to_uppercase();
            if m.translated_text != m.original_text {
                format!(
                    "{}: {} (translated: {})",
                    role, m.original_text, m.translated_text
                )
            } else {
                format!("{}: {}", role, m.original_text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use crate::providers::MockProvider;

    fn message(role: &str, original: &str, translated: &str) -> Message {
        NewMessage {
            role: Some(role.to_string()),
            original_text: Some(original.to_string()),
            translated_text: Some(translated.to_string()),
            ..Default::default()
        }
        .into_message("conv")
        .unwrap()
    }

    #[test]
    fn test_transcript_format() {
        let messages = vec![
            message("doctor", "What hurts?", "¿Qué le duele?"),
            message("patient", "Mi rodilla", "My knee"),
            message("doctor", "Okay", "Okay"),
        ];
        assert_eq!(
            build_transcript(&messages),
            "DOCTOR: What hurts? (translated: ¿Qué le duele?)\n\
             PATIENT: Mi rodilla (translated: My knee)\n\
             DOCTOR: Okay"
        );
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(build_transcript(&[]), "");
    }

    #[tokio::test]
    async fn test_summary_prompt_and_passthrough() {
        let provider = Arc::new(MockProvider::new("").reply("\n## Chief complaint\n- Knee pain\n"));
        let gw = SummaryGateway::new(provider.clone(), "gpt-4o-mini");

        let summary = gw
            .summarize(&[message("patient", "My knee hurts", "Me duele la rodilla")])
            .await
            .unwrap();
        assert_eq!(summary, "## Chief complaint\n- Knee pain");

        let req = &provider.requests()[0];
        assert_eq!(req.max_tokens, Some(800));
        assert!(req.system_prompt.contains("medical scribe"));
        assert!(req.system_prompt.contains("Medications"));
        assert_eq!(
            req.user_content,
            "PATIENT: My knee hurts (translated: Me duele la rodilla)"
        );
    }

    #[tokio::test]
    async fn test_failures_surface() {
        let provider = Arc::new(MockProvider::new("").fail("timeout"));
        let gw = SummaryGateway::new(provider, "m");
        assert!(matches!(
            gw.summarize(&[]).await,
            Err(SummaryError::Provider(_))
        ));

        let provider = Arc::new(MockProvider::new("  "));
        let gw = SummaryGateway::new(provider, "m").with_max_tokens(10);
        assert!(matches!(gw.summarize(&[]).await, Err(SummaryError::Empty)));
    }
}
