//! VM telemetry preprocessing and analysis
//!
//! This crate provides the core functionality for:
//! - Loading raw per-reading VM telemetry
//! - Normalizing and aggregating it into a per-day, per-instance table
//! - Statistical analysis (summaries, correlations, trends, cost, utilization, anomalies)
//! - Train/test partitioning of the aggregate table
//! - LLM-backed optimization recommendations and operational alerts
//! - Health checks and observability

pub mod alerts;
pub mod analysis;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod preprocess;
pub mod recommend;
pub mod snapshot;
pub mod split;
pub mod stats;

pub use analysis::{analyze, analyze_events, AnalysisReport};
pub use error::{Error, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use preprocess::{preprocess, Preprocessor};
