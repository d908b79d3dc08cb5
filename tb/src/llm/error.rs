//! Provider failures

use std::time::Duration;
use thiserror::Error;

/// Why a generation provider did not produce a reply
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 429; the wait is the `retry-after` header or a default
    #[error("Provider rate limited the request, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Provider returned HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Could not reach provider: {0}")]
    Network(#[from] reqwest::Error),

    /// Reply arrived but has no usable shape (no candidates, missing fields)
    #[error("Unreadable provider reply: {0}")]
    InvalidResponse(String),

    /// The provider declined to generate (safety filter, policy block)
    #[error("Provider refused to generate: {0}")]
    Refused(String),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Provider JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client could not be constructed (unknown provider, missing key)
    #[error("Cannot build provider client: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether sending the same request again may succeed
    ///
    /// Refusals and malformed replies are deterministic for a given prompt;
    /// 4xx other than 429 are caller problems.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::InvalidResponse(_) | LlmError::Refused(_) | LlmError::Json(_) | LlmError::Config(_) => false,
        }
    }

    /// The provider's wait hint, shown to the user with a rate-limit failure
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
