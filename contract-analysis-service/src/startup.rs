//! Application startup and lifecycle management.
//!
//! The service runs as a Function Compute custom runtime: an HTTP server that
//! receives event invocations on `/invoke` and HTTP-trigger traffic on `/`
//! and `/analyze`. Health and metrics endpoints sit alongside.

use crate::config::AnalysisConfig;
use crate::handlers::RequestHandler;
use crate::models::{HandlerResult, InvocationEvent};
use crate::services::metrics;
use crate::services::providers::dashscope::{DashScopeConfig, DashScopeTextProvider};
use crate::services::providers::TextProvider;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    middleware::from_fn,
    response::IntoResponse,
    routing::{any, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use service_core::observability::REQUEST_ID_HEADER;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub handler: RequestHandler,
}

impl AppState {
    pub fn new(handler: RequestHandler) -> Self {
        Self { handler }
    }
}

/// Health check endpoint for platform liveness probes.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "contract-analysis-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_endpoint() -> Result<String, AppError> {
    match metrics::get_metrics() {
        Some(Ok(text)) => Ok(text),
        Some(Err(e)) => Err(AppError::InternalError(anyhow::anyhow!(
            "Failed to encode metrics: {}",
            e
        ))),
        None => Err(AppError::ServiceUnavailable),
    }
}

/// Event invocation: the request body is the invocation event itself and the
/// handler result goes back serialized, for the platform to interpret.
async fn invoke(State(state): State<AppState>, body: Bytes) -> Json<HandlerResult> {
    let raw = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

    Json(state.handler.handle(InvocationEvent::new(raw)).await)
}

/// HTTP trigger: the request is wrapped into an event and the handler result
/// becomes the HTTP response.
async fn http_trigger(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let event = http_event(&method, &uri, &headers, &body);
    state.handler.handle(event).await
}

/// Build the event envelope the platform would deliver for this request.
pub fn http_event(method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> InvocationEvent {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    let (body, is_base64_encoded) = match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (STANDARD.encode(body), true),
    };

    InvocationEvent::new(json!({
        "httpMethod": method.as_str(),
        "path": uri.path(),
        "headers": headers,
        "body": body,
        "isBase64Encoded": is_base64_encoded,
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/invoke", post(invoke))
        .route("/", any(http_trigger))
        .route("/analyze", any(http_trigger))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AnalysisConfig) -> Result<Self, AppError> {
        let provider = DashScopeTextProvider::new(DashScopeConfig {
            api_key: config.dashscope.api_key.clone(),
            base_url: config.dashscope.base_url.clone(),
            model: config.dashscope.model.clone(),
            timeout: config.dashscope.timeout(),
        })
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{}", e)))?;

        tracing::info!(
            model = %config.dashscope.model,
            endpoint = %provider.endpoint(),
            timeout_secs = config.dashscope.timeout_secs,
            "Initialized DashScope text provider"
        );

        let provider: Arc<dyn TextProvider> = Arc::new(provider);
        let state = AppState::new(RequestHandler::new(provider));

        // Port 0 = random port for testing
        let address = config.common.bind_address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Contract analysis service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl-C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_event_carries_method_path_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());

        let event = http_event(
            &Method::POST,
            &"/analyze?x=1".parse().unwrap(),
            &headers,
            br#"{"text":"hello"}"#,
        );

        assert_eq!(event.http_method(), Some("POST"));
        assert_eq!(event.raw()["path"], "/analyze");
        assert_eq!(event.raw()["headers"]["content-type"], "application/json");
        assert_eq!(event.raw()["isBase64Encoded"], false);
        assert_eq!(
            event.decode(),
            crate::models::PayloadSource::Body(json!({"text": "hello"}))
        );
    }

    #[test]
    fn binary_body_is_base64_encoded() {
        let event = http_event(&Method::POST, &"/".parse().unwrap(), &HeaderMap::new(), &[0xff, 0xfe]);

        assert_eq!(event.raw()["isBase64Encoded"], true);
        assert_eq!(event.raw()["body"], STANDARD.encode([0xff, 0xfe]));
        // Not JSON once decoded, so the event itself is the payload.
        assert_eq!(event.decode().kind(), "event");
    }
}
