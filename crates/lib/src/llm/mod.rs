//! Text generation abstraction and the Gemini client.
//!
//! The reply logic only needs "text in, text out, or failure"; [`TextGenerator`] is that seam.

mod gemini;

pub use gemini::{
    Candidate, Content, GeminiClient, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, PromptFeedback,
};

use async_trait::async_trait;

/// Failure of a generation call. Never shown to the chat user.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
    #[error("generation blocked: {0}")]
    Blocked(String),
    #[error("generation returned no text")]
    EmptyResponse,
}

/// Remote text generation: one prompt, one completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`. Implementations return non-empty text on success.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
