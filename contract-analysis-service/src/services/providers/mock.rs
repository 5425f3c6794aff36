//! Mock provider implementation for testing.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock does when asked to generate.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Succeed with this text (`None` = empty upstream reply).
    Reply(Option<String>),
    Status(u16),
    Network,
    Timeout,
    NotConfigured,
}

/// Mock text provider that records every prompt it receives.
pub struct MockTextProvider {
    behavior: MockBehavior,
    prompts: Mutex<Vec<String>>,
}

impl MockTextProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(MockBehavior::Reply(Some(text.to_string())))
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.behavior {
            MockBehavior::Reply(text) => Ok(ProviderResponse {
                text: text.clone(),
                input_tokens: prompt.chars().count() as u32 / 4,
                output_tokens: text.as_ref().map_or(0, |t| t.chars().count() as u32 / 4),
                request_id: Some("mock-request".to_string()),
            }),
            MockBehavior::Status(status) => Err(ProviderError::Status {
                status: *status,
                body: "mock upstream error".to_string(),
            }),
            MockBehavior::Network => Err(ProviderError::Network(
                "mock connection refused".to_string(),
            )),
            MockBehavior::Timeout => Err(ProviderError::Timeout),
            MockBehavior::NotConfigured => Err(ProviderError::NotConfigured(
                "Mock provider has no API key".to_string(),
            )),
        }
    }
}
