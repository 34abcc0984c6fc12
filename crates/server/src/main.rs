//! VM insight server
//!
//! Serves preprocessed telemetry, the analysis report and LLM
//! recommendations over HTTP.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use insight_lib::{
    health::{components, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    recommend::{load_context, GeminiClient, Recommender, TextGenerator},
};
use insight_server::{api, config};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting insight-server");

    let config = config::ServerConfig::load()?;
    info!(
        input_path = %config.input_path,
        port = config.port,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DATASET).await;
    health_registry.register(components::PIPELINE).await;
    health_registry.register(components::RECOMMENDER).await;

    if !Path::new(&config.input_path).exists() {
        warn!(path = %config.input_path, "Input file not found");
        health_registry
            .set_unhealthy(components::DATASET, "input file not found")
            .await;
    }

    let metrics = PipelineMetrics::new();
    metrics.set_model(&config.model);

    let generator: Option<Arc<dyn TextGenerator>> = match &config.google_api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(
            key.clone(),
            config.model.clone(),
            config.gemini_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?)),
        None => {
            warn!("No Google AI API key configured, recommendations disabled");
            health_registry
                .set_degraded(components::RECOMMENDER, "API key not configured")
                .await;
            None
        }
    };
    let context = load_context(config.context_path.as_deref().map(Path::new));
    let recommender = Recommender::new(generator, context);

    let logger = StructuredLogger::new("insight-server");
    logger.log_startup(SERVER_VERSION, &config.input_path, &config.model);

    let port = config.port;
    let app_state = Arc::new(api::AppState::new(
        config,
        health_registry.clone(),
        metrics,
        recommender,
    ));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = api::serve(port, app_state) => {
            if let Err(e) = result {
                error!(error = %e, "API server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
