use async_trait::async_trait;

use super::types::{CompletionRequest, ProviderError};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return the generated text for `request`, untrimmed.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}
