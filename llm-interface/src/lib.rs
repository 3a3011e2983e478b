pub mod generator;
pub mod prompt;
pub mod remote;

pub use generator::{DigestGenerator, GenerationState};
pub use prompt::PromptBuilder;
pub use remote::OpenAiCompatibleProvider;

use subdigest_core::ProviderFailure;

/// One chat completion: a system instruction plus the user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// A completion backend. Implementations make exactly one attempt per call.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Label used in logs, e.g. `primary (deepseek-chat)`.
    fn name(&self) -> String;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderFailure>;
}
