//! DashScope (Tongyi Qianwen) text-generation provider.
//!
//! One non-streaming POST per analysis, `result_format = "message"`.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::observability::TracedClientExt;
use std::time::Duration;

/// Path of the text-generation service below the API root.
pub const GENERATION_PATH: &str = "/services/aigc/text-generation/generation";

/// DashScope provider configuration.
#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    pub api_key: SecretString,
    /// API root, e.g. `https://dashscope.aliyuncs.com/api/v1`.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

pub struct DashScopeTextProvider {
    config: DashScopeConfig,
    endpoint: String,
    client: Client,
}

impl DashScopeTextProvider {
    pub fn new(config: DashScopeConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            GENERATION_PATH
        );

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> GenerationRequest<'a> {
        GenerationRequest {
            model: &self.config.model,
            input: Input {
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            },
            parameters: Parameters {
                result_format: "message",
                max_tokens: params.max_tokens,
                temperature: params.temperature,
            },
        }
    }
}

#[async_trait]
impl TextProvider for DashScopeTextProvider {
    fn name(&self) -> &'static str {
        "dashscope"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let api_key = self.config.api_key.expose_secret();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "DashScope API key not configured".to_string(),
            ));
        }

        let request = self.build_request(prompt, params);

        tracing::debug!(
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "Sending request to DashScope"
        );

        let response = self
            .client
            .traced_post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;

        // A 2xx with an unreadable body is reported as an empty analysis.
        let parsed: GenerationResponse = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "DashScope returned a non-JSON success body");
            GenerationResponse::default()
        });

        let usage = parsed.usage.unwrap_or_default();

        Ok(ProviderResponse {
            text: parsed.output.and_then(Output::into_text),
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            request_id: parsed.request_id,
        })
    }
}

// ============================================================================
// DashScope API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: Input<'a>,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Input<'a> {
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Parameters {
    result_format: &'static str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize, Default)]
struct GenerationResponse {
    #[serde(default)]
    output: Option<Output>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Output {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    /// Populated when the upstream ignores `result_format = "message"`.
    #[serde(default)]
    text: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

fn non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

impl Output {
    /// First choice's message content, else `output.text`.
    fn into_text(self) -> Option<String> {
        let from_choice = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .and_then(non_empty_string);

        from_choice.or_else(|| self.text.and_then(non_empty_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(base_url: &str) -> DashScopeTextProvider {
        DashScopeTextProvider::new(DashScopeConfig {
            api_key: SecretString::new("sk-test".to_string()),
            base_url: base_url.to_string(),
            model: "qwen-turbo".to_string(),
            timeout: Duration::from_secs(30),
        })
        .unwrap()
    }

    fn extract(body: Value) -> Option<String> {
        let parsed: GenerationResponse = serde_json::from_value(body).unwrap();
        parsed.output.and_then(Output::into_text)
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            provider("https://dashscope.aliyuncs.com/api/v1/").endpoint(),
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation"
        );
    }

    #[test]
    fn request_body_matches_wire_format() {
        let provider = provider("http://localhost");
        let request = provider.build_request("analyze this", &GenerationParams::default());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "qwen-turbo");
        assert_eq!(value["input"]["messages"][0]["role"], "user");
        assert_eq!(value["input"]["messages"][0]["content"], "analyze this");
        assert_eq!(value["parameters"]["result_format"], "message");
        assert_eq!(value["parameters"]["max_tokens"], 1500);
        let temperature = value["parameters"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn prefers_choice_content() {
        let text = extract(json!({
            "output": {
                "choices": [{"message": {"role": "assistant", "content": "X"}}],
                "text": "ignored"
            }
        }));
        assert_eq!(text.as_deref(), Some("X"));
    }

    #[test]
    fn falls_back_to_output_text() {
        assert_eq!(
            extract(json!({"output": {"text": "plain"}})).as_deref(),
            Some("plain")
        );
        assert_eq!(
            extract(json!({"output": {"choices": [], "text": "plain"}})).as_deref(),
            Some("plain")
        );
        assert_eq!(
            extract(json!({"output": {"choices": [{"message": {"content": ""}}], "text": "plain"}}))
                .as_deref(),
            Some("plain")
        );
    }

    #[test]
    fn empty_or_odd_shapes_yield_none() {
        assert_eq!(extract(json!({})), None);
        assert_eq!(extract(json!({"output": null})), None);
        assert_eq!(extract(json!({"output": {"choices": null, "text": null}})), None);
        assert_eq!(extract(json!({"output": {"choices": [{}]}})), None);
        assert_eq!(
            extract(json!({"output": {"choices": [{"message": {"content": [{"text": "multi"}]}}]}})),
            None
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_sending() {
        let provider = DashScopeTextProvider::new(DashScopeConfig {
            api_key: SecretString::new(String::new()),
            // Unroutable: the call must never be attempted.
            base_url: "http://127.0.0.1:9".to_string(),
            model: "qwen-turbo".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let err = provider
            .generate("prompt", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
