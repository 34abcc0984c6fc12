//! HTTP API: pipeline routes, alerts, health checks and Prometheus metrics

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use insight_lib::{
    alerts::{filter_by_impact, mock_alerts, Alert, ImpactLevel},
    analysis::{analyze, AnalysisReport},
    health::{components, ComponentStatus, HealthRegistry},
    ingest::read_events,
    observability::{PipelineMetrics, StructuredLogger},
    preprocess::Preprocessor,
    recommend::{RecommendationResponse, Recommender},
    AggregateRecord, RawEvent,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub logger: StructuredLogger,
    pub recommender: Recommender,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        health_registry: HealthRegistry,
        metrics: PipelineMetrics,
        recommender: Recommender,
    ) -> Self {
        Self {
            config,
            health_registry,
            metrics,
            logger: StructuredLogger::new("insight-server"),
            recommender,
        }
    }
}

/// Any failure on a data route, rendered as `500 {"error": ...}`
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:#}", self.0) })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "status": "VM insight backend running" }))
}

/// Load the configured telemetry file off the async runtime
async fn load_events(state: &AppState) -> anyhow::Result<Vec<RawEvent>> {
    let path = PathBuf::from(&state.config.input_path);
    let loaded = tokio::task::spawn_blocking(move || read_events(&path))
        .await
        .context("Loader task panicked")?;

    match loaded {
        Ok(events) => {
            state.health_registry.set_healthy(components::DATASET).await;
            state.metrics.add_events_ingested(events.len() as u64);
            Ok(events)
        }
        Err(e) => {
            state
                .health_registry
                .set_unhealthy(components::DATASET, e.to_string())
                .await;
            Err(anyhow::Error::new(e).context("Failed to load VM telemetry"))
        }
    }
}

/// Run preprocessing (and optionally analysis) on the blocking pool
async fn run_pipeline(
    state: &AppState,
    events: Vec<RawEvent>,
    with_analysis: bool,
) -> anyhow::Result<(Vec<AggregateRecord>, Option<AnalysisReport>)> {
    let mut preprocessor = Preprocessor::new();
    // only the preprocessed route persists; analysis never touches disk
    if let (Some(path), false) = (&state.config.snapshot_path, with_analysis) {
        preprocessor = preprocessor.with_snapshot(path);
    }
    let metrics = state.metrics.clone();
    let event_count = events.len();
    let start = Instant::now();

    let outcome = tokio::task::spawn_blocking(move || -> insight_lib::Result<_> {
        let started = Instant::now();
        let records = preprocessor.run(&events)?;
        metrics.observe_preprocess_latency(started.elapsed().as_secs_f64());
        metrics.set_aggregates_produced(records.len() as i64);

        if !with_analysis {
            return Ok((records, None));
        }
        let started = Instant::now();
        let report = analyze(&records)?;
        metrics.observe_analysis_latency(started.elapsed().as_secs_f64());
        Ok((records, Some(report)))
    })
    .await
    .context("Pipeline task panicked")?;

    let stage = if with_analysis { "analysis" } else { "preprocess" };
    match outcome {
        Ok((records, report)) => {
            let anomalies = report.as_ref().map(|r| r.anomaly_count()).unwrap_or(0);
            if let Some(report) = &report {
                let instances = report
                    .instance_summary
                    .as_ref()
                    .map(|s| s.total_instances)
                    .unwrap_or(0);
                state.metrics.set_instances_analyzed(instances as i64);
                state.metrics.set_anomalies_detected(anomalies as i64);
            }
            state.health_registry.set_healthy(components::PIPELINE).await;
            state.logger.log_pipeline_completed(
                stage,
                event_count,
                records.len(),
                anomalies,
                start.elapsed().as_millis(),
            );
            Ok((records, report))
        }
        Err(e) => {
            state.metrics.inc_pipeline_errors();
            state.logger.log_pipeline_failed(stage, &e.to_string());
            state
                .health_registry
                .set_degraded(components::PIPELINE, e.to_string())
                .await;
            Err(anyhow::Error::new(e).context(format!("{} failed", stage)))
        }
    }
}

async fn vm_preprocessed(State(state): State<Arc<AppState>>) -> ApiResult<Vec<AggregateRecord>> {
    let events = load_events(&state).await?;
    let (records, _) = run_pipeline(&state, events, false).await?;
    Ok(Json(records))
}

async fn vm_analysis(State(state): State<Arc<AppState>>) -> ApiResult<AnalysisReport> {
    let events = load_events(&state).await?;
    let (_, report) = run_pipeline(&state, events, true).await?;
    let report = report.context("Analysis produced no report")?;
    Ok(Json(report))
}

async fn vm_recommendations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<RecommendationResponse> {
    let events = load_events(&state).await?;
    let response = state.recommender.recommend(events).await;

    if response.error.is_some() && state.recommender.is_configured() {
        state
            .health_registry
            .set_degraded(
                components::RECOMMENDER,
                response.error.clone().unwrap_or_default(),
            )
            .await;
    } else if response.error.is_none() {
        state.health_registry.set_healthy(components::RECOMMENDER).await;
    }
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub impact: Option<String>,
}

async fn alerts(Query(query): Query<AlertQuery>) -> Response {
    let impact = match query.impact.as_deref().map(str::parse::<ImpactLevel>) {
        None => None,
        Some(Ok(level)) => Some(level),
        Some(Err(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match mock_alerts() {
        Ok(all) => {
            let selected: Vec<Alert> = filter_by_impact(all, impact);
            Json(selected).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return ApiError::from(e).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/vm/preprocessed", get(vm_preprocessed))
        .route("/vm/analysis", get(vm_analysis))
        .route("/vm/recommendations", get(vm_recommendations))
        .route("/alerts", get(alerts))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
