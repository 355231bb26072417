use async_trait::async_trait;
use reqwest::Client;

use super::models::*;
use crate::providers::traits::LlmProvider;
use crate::providers::types::{CompletionRequest, LlmSettings, ProviderError};

/// Chat-completions client for OpenAI and API-compatible servers.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            endpoint: Self::completions_url(settings.base_url.as_str()),
        }
    }

    fn completions_url(base: &str) -> String {
        format!("{}/v1/chat/completions", base.trim_end_matches('/'))
    }

    fn build_request(request: &CompletionRequest) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(request.system_prompt.clone()),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: Some(request.user_content.clone()),
        });

        OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
        }
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    /// A choice with `null` content counts as empty output; only a response
    /// without choices is invalid.
    fn extract_content(response: OpenAiResponse) -> Result<String, ProviderError> {
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredential)?;

        let body = Self::build_request(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                model = %request.model,
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                "completion finished"
            );
        }

        Self::extract_content(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn settings(api_key: Option<&str>, base: &str) -> LlmSettings {
        LlmSettings {
            api_key: api_key.map(str::to_string),
            base_url: Url::parse(base).unwrap(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            system_prompt: "Be brief.".to_string(),
            user_content: "Hello".to_string(),
            max_tokens: Some(500),
        }
    }

    #[test]
    fn test_completions_url_handles_trailing_slash() {
        let provider = OpenAiProvider::new(&settings(Some("k"), "http://localhost:8080/"));
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(OpenAiProvider::build_request(&request())).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 500);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_extract_first_choice() {
        let parsed: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" Hola "},"finish_reason":"stop"}],"usage":null}"#,
        )
        .unwrap();
        assert_eq!(OpenAiProvider::extract_content(parsed).unwrap(), " Hola ");

        let null_content: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )
        .unwrap();
        assert_eq!(OpenAiProvider::extract_content(null_content).unwrap(), "");

        let empty: OpenAiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            OpenAiProvider::extract_content(empty),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_message() {
        let msg = OpenAiProvider::parse_error_message(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"bad model"}}"#,
        );
        assert_eq!(msg, "HTTP 400: bad model");
        let msg = OpenAiProvider::parse_error_message(reqwest::StatusCode::BAD_GATEWAY, "<html>");
        assert_eq!(msg, "HTTP 502: Request failed");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let provider = OpenAiProvider::new(&settings(None, "http://127.0.0.1:9"));
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential));

        let blank = OpenAiProvider::new(&settings(Some(""), "http://127.0.0.1:9"));
        assert!(matches!(
            blank.complete(request()).await,
            Err(ProviderError::MissingCredential)
        ));
    }
}
