pub mod mock;
pub mod openai;
pub mod traits;
pub mod types;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;
pub use traits::LlmProvider;
pub use types::{CompletionRequest, LlmSettings, ProviderError};
