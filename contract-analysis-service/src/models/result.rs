use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Headers attached to every result, preflight included.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
    ("Content-Type", "application/json"),
];

/// HTTP-shaped result handed back to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResult {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON document serialized as a string, or empty for preflight.
    pub body: String,
}

fn cors_headers() -> BTreeMap<String, String> {
    CORS_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// ISO-8601 UTC with milliseconds, e.g. `2024-05-01T08:30:00.123Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl HandlerResult {
    fn with_body(status_code: u16, body: Value) -> Self {
        Self {
            status_code,
            headers: cors_headers(),
            body: body.to_string(),
        }
    }

    pub fn preflight() -> Self {
        Self {
            status_code: 200,
            headers: cors_headers(),
            body: String::new(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::with_body(
            400,
            json!({
                "success": false,
                "error": error.into(),
            }),
        )
    }

    pub fn success(result: impl Into<String>) -> Self {
        Self::with_body(
            200,
            json!({
                "success": true,
                "result": result.into(),
                "timestamp": timestamp_now(),
            }),
        )
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::with_body(
            500,
            json!({
                "success": false,
                "error": error.into(),
                "timestamp": timestamp_now(),
            }),
        )
    }

    /// Parse `body` back into JSON; `None` for the empty preflight body.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

impl IntoResponse for HandlerResult {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_cors(result: &HandlerResult) {
        assert_eq!(result.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(result.headers["Access-Control-Allow-Headers"], "Content-Type");
        assert_eq!(result.headers["Access-Control-Allow-Methods"], "POST, OPTIONS");
        assert_eq!(result.headers["Content-Type"], "application/json");
    }

    #[test]
    fn preflight_has_empty_body() {
        let result = HandlerResult::preflight();
        assert_eq!(result.status_code, 200);
        assert_eq!(result.body, "");
        assert!(result.body_json().is_none());
        assert_cors(&result);
    }

    #[test]
    fn bad_request_has_no_timestamp() {
        let result = HandlerResult::bad_request("合同文本不能为空");
        let body = result.body_json().unwrap();

        assert_eq!(result.status_code, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "合同文本不能为空");
        assert!(body.get("timestamp").is_none());
        assert_cors(&result);
    }

    #[test]
    fn success_carries_result_and_timestamp() {
        let result = HandlerResult::success("analysis");
        let body = result.body_json().unwrap();

        assert_eq!(result.status_code, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["result"], "analysis");
        let ts = body["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn failure_is_500_with_error() {
        let result = HandlerResult::failure("请求超时");
        let body = result.body_json().unwrap();

        assert_eq!(result.status_code, 500);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "请求超时");
        assert!(body["timestamp"].is_string());
        assert_cors(&result);
    }

    #[test]
    fn serializes_with_platform_field_names() {
        let value = serde_json::to_value(HandlerResult::preflight()).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], "");
        assert_eq!(value["headers"]["Content-Type"], "application/json");
    }

    #[test]
    fn converts_into_http_response() {
        let response = HandlerResult::bad_request("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
    }
}
