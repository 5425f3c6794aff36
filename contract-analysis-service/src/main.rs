use contract_analysis_service::config::AnalysisConfig;
use contract_analysis_service::services::metrics;
use contract_analysis_service::startup::Application;
use dotenvy::dotenv;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    init_tracing(
        "contract-analysis-service",
        "info",
        otlp_endpoint.as_deref(),
    );

    let config = AnalysisConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let app = Application::build(config).await?;
    app.run_until_stopped().await?;

    Ok(())
}
