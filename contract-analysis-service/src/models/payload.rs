use serde_json::Value;
use thiserror::Error;

/// Contracts shorter than this are rejected before any upstream call.
pub const MIN_CONTRACT_CHARS: usize = 5;

/// Client-facing message for a missing or too-short contract.
pub const EMPTY_CONTRACT_MESSAGE: &str = "合同文本不能为空";

/// Output language of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    Zh,
    En,
    /// Any code other than `zh`/`en`.
    Es,
}

impl Lang {
    pub fn from_code(code: &str) -> Self {
        match code {
            "zh" => Lang::Zh,
            "en" => Lang::En,
            _ => Lang::Es,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Lang::Zh => "zh",
            Lang::En => "en",
            Lang::Es => "es",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", EMPTY_CONTRACT_MESSAGE)]
    EmptyContract,
}

/// Caller payload as found in the invocation event, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPayload {
    pub text: Option<String>,
    pub lang: Lang,
}

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRequest {
    pub text: String,
    pub lang: Lang,
}

impl RequestPayload {
    /// Best-effort extraction; non-string fields count as absent.
    pub fn from_value(value: &Value) -> Self {
        let text = value.get("text").and_then(Value::as_str).map(str::to_string);
        let lang = value
            .get("lang")
            .and_then(Value::as_str)
            .map(Lang::from_code)
            .unwrap_or_default();

        Self { text, lang }
    }

    pub fn validate(self) -> Result<ContractRequest, ValidationError> {
        match self.text {
            Some(text) if text.chars().count() >= MIN_CONTRACT_CHARS => Ok(ContractRequest {
                text,
                lang: self.lang,
            }),
            _ => Err(ValidationError::EmptyContract),
        }
    }
}
