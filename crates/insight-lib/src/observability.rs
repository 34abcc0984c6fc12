//! Observability infrastructure for the insight pipeline
//!
//! Provides:
//! - Prometheus metrics (preprocessing and analysis latency, record counts, failures)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for pipeline stage latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    preprocess_latency_seconds: Histogram,
    analysis_latency_seconds: Histogram,
    recommendation_latency_seconds: Histogram,
    events_ingested: IntCounter,
    aggregates_produced: IntGauge,
    instances_analyzed: IntGauge,
    anomalies_detected: IntGauge,
    pipeline_errors: IntCounter,
    recommendation_errors: IntCounter,
    model_info: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            preprocess_latency_seconds: register_histogram!(
                "vm_insight_preprocess_latency_seconds",
                "Time spent normalizing and aggregating raw events",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register preprocess_latency_seconds"),

            analysis_latency_seconds: register_histogram!(
                "vm_insight_analysis_latency_seconds",
                "Time spent running the analysis passes",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            recommendation_latency_seconds: register_histogram!(
                "vm_insight_recommendation_latency_seconds",
                "Time spent waiting for the language model",
                vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
            )
            .expect("Failed to register recommendation_latency_seconds"),

            events_ingested: register_int_counter!(
                "vm_insight_events_ingested_total",
                "Total number of raw telemetry events processed"
            )
            .expect("Failed to register events_ingested"),

            aggregates_produced: register_int_gauge!(
                "vm_insight_aggregates_produced",
                "Number of daily aggregate records in the last run"
            )
            .expect("Failed to register aggregates_produced"),

            instances_analyzed: register_int_gauge!(
                "vm_insight_instances_analyzed",
                "Number of distinct instances in the last analysis"
            )
            .expect("Failed to register instances_analyzed"),

            anomalies_detected: register_int_gauge!(
                "vm_insight_anomalies_detected",
                "Number of anomalous observations in the last analysis"
            )
            .expect("Failed to register anomalies_detected"),

            pipeline_errors: register_int_counter!(
                "vm_insight_pipeline_errors_total",
                "Total number of failed pipeline runs"
            )
            .expect("Failed to register pipeline_errors"),

            recommendation_errors: register_int_counter!(
                "vm_insight_recommendation_errors_total",
                "Total number of failed recommendation requests"
            )
            .expect("Failed to register recommendation_errors"),

            model_info: register_gauge_vec!(
                "vm_insight_model_info",
                "Language model used for recommendations",
                &["model"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// A handle to the process-wide metrics; clones share the same series.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_preprocess_latency(&self, duration_secs: f64) {
        self.inner().preprocess_latency_seconds.observe(duration_secs);
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn observe_recommendation_latency(&self, duration_secs: f64) {
        self.inner().recommendation_latency_seconds.observe(duration_secs);
    }

    pub fn add_events_ingested(&self, count: u64) {
        self.inner().events_ingested.inc_by(count);
    }

    pub fn set_aggregates_produced(&self, count: i64) {
        self.inner().aggregates_produced.set(count);
    }

    pub fn set_instances_analyzed(&self, count: i64) {
        self.inner().instances_analyzed.set(count);
    }

    pub fn set_anomalies_detected(&self, count: i64) {
        self.inner().anomalies_detected.set(count);
    }

    pub fn inc_pipeline_errors(&self) {
        self.inner().pipeline_errors.inc();
    }

    pub fn inc_recommendation_errors(&self) {
        self.inner().recommendation_errors.inc();
    }

    pub fn set_model(&self, model: &str) {
        self.inner().model_info.reset();
        self.inner().model_info.with_label_values(&[model]).set(1.0);
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_pipeline_completed(
        &self,
        stage: &str,
        events: usize,
        aggregates: usize,
        anomalies: usize,
        duration_ms: u128,
    ) {
        info!(
            event = "pipeline_completed",
            service = %self.service,
            stage = %stage,
            events = events,
            aggregates = aggregates,
            anomalies = anomalies,
            duration_ms = duration_ms as u64,
            "Pipeline run completed"
        );
    }

    pub fn log_pipeline_failed(&self, stage: &str, error: &str) {
        warn!(
            event = "pipeline_failed",
            service = %self.service,
            stage = %stage,
            error = %error,
            "Pipeline run failed"
        );
    }

    pub fn log_recommendation(&self, model: &str, insights: usize, recommendations: usize) {
        info!(
            event = "recommendation_generated",
            service = %self.service,
            model = %model,
            insights = insights,
            recommendations = recommendations,
            "Generated recommendations"
        );
    }

    pub fn log_recommendation_failed(&self, model: &str, reason: &str) {
        warn!(
            event = "recommendation_failed",
            service = %self.service,
            model = %model,
            reason = %reason,
            "Recommendation generation failed"
        );
    }

    pub fn log_startup(&self, version: &str, input_path: &str, model: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            input_path = %input_path,
            model = %model,
            "VM insight service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "VM insight service shutting down"
        );
    }
}
