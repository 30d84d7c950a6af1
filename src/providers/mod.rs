//! GenerationProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core so that critique workers
//! only see "system prompt + user prompt in, text out".

pub mod rig;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Upper bound on the delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Errors from a generation provider.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("LLM API error: {0}")]
    Api(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f64,
}

/// Text generation backend used by critique workers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient errors, `None` otherwise.
pub fn classify_error(err: &GenerationError) -> Option<&'static str> {
    let GenerationError::Api(msg) = err else {
        return None;
    };
    let msg = msg.to_lowercase();
    if msg.contains("429") || msg.contains("rate limit") || msg.contains("too many requests") {
        Some("Rate limited by API")
    } else if msg.contains("503")
        || msg.contains("service unavailable")
        || msg.contains("high demand")
    {
        Some("High model load")
    } else if msg.contains("529") || msg.contains("overloaded") {
        Some("API overloaded")
    } else if msg.contains("502") {
        Some("API gateway error")
    } else if msg.contains("timeout") || msg.contains("timed out") {
        Some("Request timed out")
    } else if msg.contains("connection") {
        Some("Connection error")
    } else if msg.contains("temporarily") || msg.contains("try again") {
        Some("Temporary API error")
    } else {
        None
    }
}

/// Whether a provider error is transient and worth retrying.
pub fn is_retryable(err: &GenerationError) -> bool {
    classify_error(err).is_some()
}

/// Exponential backoff: `base * 2^attempt`, capped at [`MAX_BACKOFF`].
pub fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}
