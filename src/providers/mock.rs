use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::LlmProvider;
use super::types::{CompletionRequest, ProviderError};

/// Scripted provider for tests and offline runs.
///
/// Replies are served in order; once the script runs out every call returns
/// the fallback reply. Every request is recorded so callers can inspect the
/// prompts that were built.
#[derive(Debug, Default)]
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            ..Default::default()
        }
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failed call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, entry: Result<String, String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(entry);
        }
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(ProviderError::RequestFailed(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}
