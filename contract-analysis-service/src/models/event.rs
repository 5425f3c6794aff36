//! Invocation envelope delivered by the Function Compute runtime.
//!
//! The platform hands us an untyped JSON object. Depending on the trigger it
//! carries the caller's payload as a serialized `body` string (HTTP trigger,
//! possibly base64-encoded), as a pre-parsed `data` object, or the event is
//! the payload itself (direct invocation).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationEvent {
    raw: Value,
}

/// Where the request payload was found.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadSource {
    /// Decoded from the `body` field.
    Body(Value),
    /// Taken verbatim from the `data` field.
    Data(Value),
    /// Nothing usable in `body`/`data`: the event itself is the payload.
    Event(Value),
}

impl PayloadSource {
    pub fn kind(&self) -> &'static str {
        match self {
            PayloadSource::Body(_) => "body",
            PayloadSource::Data(_) => "data",
            PayloadSource::Event(_) => "event",
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            PayloadSource::Body(v) | PayloadSource::Data(v) | PayloadSource::Event(v) => v,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum BodyDecodeError {
    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("body is not JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl InvocationEvent {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn http_method(&self) -> Option<&str> {
        self.raw.get("httpMethod").and_then(Value::as_str)
    }

    /// CORS preflight requests short-circuit before any payload handling.
    pub fn is_preflight(&self) -> bool {
        self.http_method()
            .is_some_and(|m| m.eq_ignore_ascii_case("OPTIONS"))
    }

    fn is_base64_encoded(&self) -> bool {
        self.raw
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Locate the request payload.
    ///
    /// A `body` that is present but cannot be decoded is not an error: the
    /// whole event is used instead, exactly like an event without a body.
    pub fn decode(self) -> PayloadSource {
        let body = match self.raw.get("body") {
            Some(Value::String(body)) if !body.is_empty() => {
                Some(decode_body(body, self.is_base64_encoded()))
            }
            Some(body @ (Value::Object(_) | Value::Array(_))) => Some(Ok(body.clone())),
            _ => None,
        };

        match body {
            Some(Ok(value)) => return PayloadSource::Body(value),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Falling back to raw event as payload");
                return PayloadSource::Event(self.raw);
            }
            None => {}
        }

        if let Some(data) = self.raw.get("data").filter(|d| is_truthy(d)) {
            return PayloadSource::Data(data.clone());
        }

        PayloadSource::Event(self.raw)
    }
}

fn decode_body(body: &str, base64_encoded: bool) -> Result<Value, BodyDecodeError> {
    let text = if base64_encoded {
        String::from_utf8(STANDARD.decode(body.trim())?)?
    } else {
        body.to_string()
    };
    Ok(serde_json::from_str(&text)?)
}

/// `null`, `false`, `0` and `""` do not count as a `data` payload.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
