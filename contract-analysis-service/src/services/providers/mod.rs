//! Text-generation provider abstraction.
//!
//! The handler only sees [`TextProvider`]; the DashScope client and the test
//! mock both sit behind it.

pub mod dashscope;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Upper bound on generated tokens per analysis.
pub const DEFAULT_MAX_TOKENS: u32 = 1500;

/// Sampling temperature for analyses.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Error type for provider operations.
///
/// One variant per failure kind the handler reports differently.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The upstream answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The request went out but no response came back.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),
}

impl ProviderError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Status { .. } => "status",
            ProviderError::Network(_) => "network",
            ProviderError::Timeout => "timeout",
            ProviderError::Request(_) => "request",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ProviderError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

/// Result of a provider call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    /// Generated text; `None` when the upstream returned nothing usable.
    pub text: Option<String>,

    pub input_tokens: u32,

    pub output_tokens: u32,

    /// Upstream request id, for correlating with provider-side logs.
    pub request_id: Option<String>,
}

/// Generation parameters for AI requests.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Trait for single-shot text generation providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Model identifier sent upstream.
    fn model(&self) -> &str;

    /// Send `prompt` as the sole user message.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_review_settings() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 1500);
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn error_kinds_are_distinct() {
        let kinds = [
            ProviderError::NotConfigured("key".into()).kind(),
            ProviderError::Status {
                status: 503,
                body: String::new(),
            }
            .kind(),
            ProviderError::Network("reset".into()).kind(),
            ProviderError::Timeout.kind(),
            ProviderError::Request("bad url".into()).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
