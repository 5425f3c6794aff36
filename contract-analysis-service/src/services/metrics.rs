//! Prometheus metrics for contract analysis.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Registry and collectors, set together so they always belong to each other.
struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    provider_latency: HistogramVec,
    provider_errors: IntCounterVec,
    tokens: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Outcome label for [`record_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Preflight,
    Invalid,
    Success,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Preflight => "preflight",
            Outcome::Invalid => "invalid",
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Register all metrics. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests = IntCounterVec::new(
        Opts::new(
            "contract_analysis_requests_total",
            "Total handler invocations by outcome",
        ),
        &["outcome"],
    )?;

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "contract_analysis_provider_latency_seconds",
            "Text-generation API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0]),
        &["provider", "model"],
    )?;

    let provider_errors = IntCounterVec::new(
        Opts::new(
            "contract_analysis_provider_errors_total",
            "Total text-generation API errors",
        ),
        &["provider", "error_type"],
    )?;

    let tokens = IntCounterVec::new(
        Opts::new("contract_analysis_tokens_total", "Total tokens processed"),
        &["model", "type"], // type: input, output
    )?;

    registry.register(Box::new(requests.clone()))?;
    registry.register(Box::new(provider_latency.clone()))?;
    registry.register(Box::new(provider_errors.clone()))?;
    registry.register(Box::new(tokens.clone()))?;

    // Lost races leave the first registration in place.
    let _ = METRICS.set(Metrics {
        registry,
        requests,
        provider_latency,
        provider_errors,
        tokens,
    });

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Get metrics in Prometheus text format, `None` before [`init_metrics`].
pub fn get_metrics() -> Option<Result<String, prometheus::Error>> {
    let registry = &METRICS.get()?.registry;

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    Some(
        encoder
            .encode(&metric_families, &mut buffer)
            .map(|_| String::from_utf8_lossy(&buffer).into_owned()),
    )
}

pub fn record_request(outcome: Outcome) {
    if let Some(m) = METRICS.get() {
        m.requests.with_label_values(&[outcome.as_str()]).inc();
    }
}

pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.provider_latency
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(m) = METRICS.get() {
        m.provider_errors.with_label_values(&[provider, error_type]).inc();
    }
}

pub fn record_tokens(model: &str, input_tokens: u32, output_tokens: u32) {
    if let Some(m) = METRICS.get() {
        m.tokens
            .with_label_values(&[model, "input"])
            .inc_by(u64::from(input_tokens));
        m.tokens
            .with_label_values(&[model, "output"])
            .inc_by(u64::from(output_tokens));
    }
}
