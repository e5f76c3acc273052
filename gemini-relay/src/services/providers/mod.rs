//! Generation provider abstraction.
//!
//! The handler only ever sees `TextProvider`, so the concrete backend (Gemini,
//! or a mock in tests) can be swapped at startup.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
///
/// The `Display` output is embedded verbatim in the 500 response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered: {0}")]
    ContentFiltered(String),

    #[error("Response contained no text")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// A text-in, text-out generation backend.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`. The prompt is passed through unmodified.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
