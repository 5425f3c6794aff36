//! The contract analysis request handler.
//!
//! `OPTIONS` → 200 preflight; invalid payload → 400; upstream call → 200 with
//! the analysis, or 500 with a message chosen by failure kind.

use crate::models::{
    ContractRequest, HandlerResult, InvocationEvent, RequestPayload, ValidationError,
};
use crate::services::metrics::{self, Outcome};
use crate::services::prompt::{build_prompt, truncate_prompt};
use crate::services::providers::{GenerationParams, ProviderError, TextProvider};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Reported as the result when the model returns nothing.
pub const EMPTY_ANALYSIS_PLACEHOLDER: &str = "AI分析完成，但返回内容为空。";

pub const GENERIC_FAILURE_MESSAGE: &str = "分析失败";
pub const NETWORK_ERROR_MESSAGE: &str = "网络错误，无法连接到AI服务";
pub const TIMEOUT_MESSAGE: &str = "请求超时";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AnalysisError {
    pub fn status_code(&self) -> u16 {
        match self {
            AnalysisError::Validation(_) => 400,
            AnalysisError::Provider(_) => 500,
        }
    }

    /// Message returned to the caller; never includes upstream details.
    pub fn client_message(&self) -> String {
        match self {
            AnalysisError::Validation(err) => err.to_string(),
            AnalysisError::Provider(ProviderError::Status { status, .. }) => {
                format!("API错误 ({})", status)
            }
            AnalysisError::Provider(ProviderError::Network(_)) => {
                NETWORK_ERROR_MESSAGE.to_string()
            }
            AnalysisError::Provider(ProviderError::Timeout) => TIMEOUT_MESSAGE.to_string(),
            AnalysisError::Provider(
                ProviderError::NotConfigured(_) | ProviderError::Request(_),
            ) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    fn into_result(self) -> HandlerResult {
        let message = self.client_message();
        match self {
            AnalysisError::Validation(_) => HandlerResult::bad_request(message),
            AnalysisError::Provider(_) => HandlerResult::failure(message),
        }
    }
}

#[derive(Clone)]
pub struct RequestHandler {
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
}

impl RequestHandler {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self {
            provider,
            params: GenerationParams::default(),
        }
    }

    /// Handle one invocation. Never fails: every outcome is a [`HandlerResult`].
    #[tracing::instrument(
        name = "analyze_contract",
        skip_all,
        fields(method = event.http_method().unwrap_or("-"))
    )]
    pub async fn handle(&self, event: InvocationEvent) -> HandlerResult {
        if event.is_preflight() {
            metrics::record_request(Outcome::Preflight);
            return HandlerResult::preflight();
        }

        let source = event.decode();
        tracing::debug!(source = source.kind(), "Decoded request payload");
        let payload = RequestPayload::from_value(&source.into_value());

        let request = match payload.validate() {
            Ok(request) => request,
            Err(err) => {
                metrics::record_request(Outcome::Invalid);
                return AnalysisError::from(err).into_result();
            }
        };

        match self.analyze(&request).await {
            Ok(analysis) => {
                metrics::record_request(Outcome::Success);
                HandlerResult::success(analysis)
            }
            Err(err) => {
                tracing::error!(error = %err, "Contract analysis failed");
                metrics::record_request(Outcome::Error);
                err.into_result()
            }
        }
    }

    async fn analyze(&self, request: &ContractRequest) -> Result<String, AnalysisError> {
        tracing::info!(
            lang = request.lang.code(),
            text_chars = request.text.chars().count(),
            "Starting contract analysis"
        );

        let prompt = truncate_prompt(build_prompt(request.lang, &request.text));

        let provider = self.provider.name();
        let model = self.provider.model();
        let started = Instant::now();

        let response = self
            .provider
            .generate(&prompt, &self.params)
            .await
            .inspect_err(|e| metrics::record_provider_error(provider, e.kind()))?;

        metrics::record_provider_latency(provider, model, started.elapsed().as_secs_f64());
        metrics::record_tokens(model, response.input_tokens, response.output_tokens);

        tracing::debug!(
            request_id = response.request_id.as_deref().unwrap_or("-"),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Provider call completed"
        );

        Ok(response
            .text
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| EMPTY_ANALYSIS_PLACEHOLDER.to_string()))
    }
}
