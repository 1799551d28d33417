//! Errors raised by the provider clients

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429; `retry_after` comes from the header when the provider sends one
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unknown LLM provider '{0}' (supported: openai, anthropic)")]
    UnknownProvider(String),

    #[error("{0}")]
    Config(String),
}
