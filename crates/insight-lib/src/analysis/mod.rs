//! Statistical analysis of the aggregate table
//!
//! Seven independent passes over a slice of [`AggregateRecord`]s:
//! - instance summary and descriptive statistics
//! - per-instance profile
//! - correlation matrix
//! - overall and per-instance trends
//! - cost analysis
//! - utilization insights
//! - IQR anomaly detection
//!
//! A column with no values in the input is treated as absent and the
//! sub-reports that depend on it are omitted.

mod anomaly;
mod correlation;
mod cost;
mod summary;
mod trend;
mod utilization;

pub use anomaly::{detect_anomalies, InstanceAnomalies, MetricAnomaly, ANOMALY_METRICS, IQR_MULTIPLIER};
pub use correlation::{
    correlation_analysis, CorrelationAnalysis, CostCorrelation, StrongCorrelation,
    CORRELATION_CANDIDATES, STRONG_CORRELATION_THRESHOLD,
};
pub use cost::{cost_analysis, CostAnalysis, InstanceCost, OverallCost, PROJECTION_DAYS};
pub use summary::{
    descriptive_stats, instance_summary, per_instance_analysis, DateRange, DateSpan,
    DescriptiveStats, InstanceProfile, InstanceSummary,
};
pub use trend::{
    split_halves_trend, trend_analysis, CostTrend, EndpointTrend, InstanceTrends,
    OverallTrends, SeriesTrend, TrendAnalysis, TrendDateRange, TrendDirection, VolumeTrend,
    TREND_THRESHOLD_PERCENT,
};
pub use utilization::{
    utilization_insights, CpuCategory, InstanceUtilization, OverallUtilization,
    ReliabilityRating, UtilizationInsights,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{AggregateRecord, Metric, RawEvent};
use crate::preprocess::{preprocess, BYTES_PER_GB};

/// Key used for records whose instance id could not be extracted
pub const UNKNOWN_INSTANCE: &str = "unknown";

/// Full analysis output, keyed by facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_summary: Option<InstanceSummary>,
    pub overall_stats: BTreeMap<String, DescriptiveStats>,
    pub per_instance_analysis: BTreeMap<String, InstanceProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_analysis: Option<CorrelationAnalysis>,
    pub trend_analysis: TrendAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_analysis: Option<CostAnalysis>,
    pub utilization_insights: UtilizationInsights,
    pub anomalies: BTreeMap<String, InstanceAnomalies>,
}

impl AnalysisReport {
    /// Total number of flagged observations across instances and metrics
    pub fn anomaly_count(&self) -> usize {
        self.anomalies
            .values()
            .flat_map(|metrics| metrics.values())
            .map(|anomaly| anomaly.count)
            .sum()
    }
}

/// Analyze an aggregate table
pub fn analyze(records: &[AggregateRecord]) -> Result<AnalysisReport> {
    validate(records)?;

    Ok(AnalysisReport {
        instance_summary: instance_summary(records),
        overall_stats: descriptive_stats(records),
        per_instance_analysis: per_instance_analysis(records),
        correlation_analysis: correlation_analysis(records),
        trend_analysis: trend_analysis(records),
        cost_analysis: cost_analysis(records),
        utilization_insights: utilization_insights(records),
        anomalies: detect_anomalies(records),
    })
}

/// Preprocess raw events (without persistence) and analyze the result
pub fn analyze_events(events: &[RawEvent]) -> Result<AnalysisReport> {
    let records = preprocess(events)?;
    analyze(&records)
}

fn validate(records: &[AggregateRecord]) -> Result<()> {
    for (index, record) in records.iter().enumerate() {
        for metric in Metric::ALL {
            if let Some(value) = metric.value(record) {
                if !value.is_finite() {
                    return Err(Error::data(
                        metric.name(),
                        format!("aggregate record {}: non-finite value {}", index + 1, value),
                    ));
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn instance_key(record: &AggregateRecord) -> String {
    record
        .instance_id
        .clone()
        .unwrap_or_else(|| UNKNOWN_INSTANCE.to_string())
}

/// Records grouped by instance, each group in chronological order
pub(crate) fn by_instance(records: &[AggregateRecord]) -> BTreeMap<String, Vec<&AggregateRecord>> {
    let mut groups: BTreeMap<String, Vec<&AggregateRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(instance_key(record)).or_default().push(record);
    }
    for rows in groups.values_mut() {
        rows.sort_by_key(|r| r.date);
    }
    groups
}

/// Non-null values of one column
pub(crate) fn column<'a>(
    records: impl IntoIterator<Item = &'a AggregateRecord>,
    metric: Metric,
) -> Vec<f64> {
    records
        .into_iter()
        .filter_map(|record| metric.value(record))
        .collect()
}

/// A column is present when at least one record carries a value for it
pub(crate) fn is_present(records: &[AggregateRecord], metric: Metric) -> bool {
    records.iter().any(|record| metric.value(record).is_some())
}

pub(crate) fn to_gb(bytes: f64) -> f64 {
    bytes / BYTES_PER_GB
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    pub fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    /// A record with CPU, memory, cost, uptime and network populated
    pub fn record(date: u32, instance: &str, cpu: f64, cost: f64) -> AggregateRecord {
        let mut record = AggregateRecord::empty(
            day(date),
            Some(instance.to_string()),
            Some("demo-project".to_string()),
            Some("us-central1-a".to_string()),
        );
        record.cpu_utilization_mean = Some(cpu);
        record.cpu_utilization_min = Some(cpu);
        record.cpu_utilization_max = Some(cpu);
        record.memory_used_gb_mean = Some(4.0);
        record.cost_usd_sum = Some(cost);
        record.cost_per_cpu_mean = Some(cost / (cpu + 0.001));
        record.uptime_fraction_mean = Some(0.99);
        record.network_total_bytes_sum = Some(2.0 * BYTES_PER_GB);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::BYTES_PER_GB;

    fn raw(timestamp: &str, instance: &str, cpu: f64, cost: f64) -> RawEvent {
        RawEvent {
            timestamp: timestamp.to_string(),
            resource_global_name: Some(format!(
                "//compute.googleapis.com/projects/demo/zones/us-east1-b/instances/{}",
                instance
            )),
            cpu_utilization: Some(cpu),
            memory_used_bytes: Some(8.0 * BYTES_PER_GB),
            disk_read_bytes: Some(1024.0),
            disk_write_bytes: Some(2048.0),
            ingress_bytes: Some(BYTES_PER_GB),
            egress_bytes: Some(BYTES_PER_GB),
            uptime_fraction: Some(1.0),
            cost_usd: Some(cost),
            sku_description: Some("E2 Instance Core running in Americas".to_string()),
        }
    }

    fn two_by_two_by_two() -> Vec<RawEvent> {
        vec![
            raw("01-02-2024 00:00", "11", 0.10, 1.50),
            raw("01-02-2024 12:00", "11", 0.20, 2.25),
            raw("01-02-2024 00:00", "22", 0.60, 4.00),
            raw("01-02-2024 12:00", "22", 0.70, 4.50),
            raw("02-02-2024 00:00", "11", 0.30, 1.75),
            raw("02-02-2024 12:00", "11", 0.40, 2.00),
            raw("02-02-2024 00:00", "22", 0.80, 5.25),
            raw("02-02-2024 12:00", "22", 0.90, 3.50),
        ]
    }

    #[test]
    fn test_fleet_scenario() {
        let events = two_by_two_by_two();
        let report = analyze_events(&events).unwrap();

        let summary = report.instance_summary.as_ref().unwrap();
        assert_eq!(summary.total_instances, 2);
        assert_eq!(summary.records_per_instance["11"], 2);
        assert_eq!(summary.records_per_instance["22"], 2);
        assert_eq!(summary.date_range.total_days, 2);

        let expected_total: f64 = events.iter().filter_map(|e| e.cost_usd).sum();
        let cost = report.cost_analysis.as_ref().unwrap();
        let overall = cost.overall.as_ref().unwrap();
        assert!((overall.total_cost - expected_total).abs() < 1e-9);
        assert!((overall.total_cost - 24.75).abs() < 1e-9);
    }

    #[test]
    fn test_constant_cpu_scenario() {
        let events: Vec<RawEvent> = (1..=6)
            .map(|d| raw(&format!("{:02}-03-2024 08:00", d), "42", 0.5, 1.0))
            .collect();
        let report = analyze_events(&events).unwrap();

        let cpu = report.utilization_insights.per_instance["42"]
            .cpu
            .as_ref()
            .unwrap();
        assert_eq!(cpu.std, 0.0);

        let trend = report.trend_analysis.per_instance["42"]
            .cpu_utilization
            .as_ref()
            .unwrap();
        assert_eq!(trend.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_single_column_descriptive_stats() {
        let records: Vec<AggregateRecord> = (1..=4)
            .map(|d| {
                let mut record = AggregateRecord::empty(fixtures::day(d), Some("1".to_string()), None, None);
                record.cost_usd_sum = Some(d as f64);
                record
            })
            .collect();

        let report = analyze(&records).unwrap();
        assert_eq!(report.overall_stats.len(), 1);

        let stats = &report.overall_stats["cost_usd_sum"];
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.q25, 1.75);
        assert_eq!(stats.q75, 3.25);

        // only cost is present: no correlation matrix, no utilization facets
        assert!(report.correlation_analysis.is_none());
        assert!(report.utilization_insights.overall.cpu.is_none());
        assert!(report.cost_analysis.is_some());
    }

    #[test]
    fn test_non_finite_aggregate_is_data_error() {
        let mut record = fixtures::record(1, "1", 0.5, 1.0);
        record.cost_usd_sum = Some(f64::INFINITY);
        assert!(matches!(analyze(&[record]), Err(Error::Data { .. })));
    }

    #[test]
    fn test_empty_table() {
        let report = analyze(&[]).unwrap();
        assert!(report.instance_summary.is_none());
        assert!(report.overall_stats.is_empty());
        assert!(report.anomalies.is_empty());
        assert!(report.cost_analysis.is_none());
        assert_eq!(report.anomaly_count(), 0);
    }

    #[test]
    fn test_report_serializes_facets() {
        let report = analyze_events(&two_by_two_by_two()).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        for key in [
            "instance_summary",
            "overall_stats",
            "per_instance_analysis",
            "correlation_analysis",
            "trend_analysis",
            "cost_analysis",
            "utilization_insights",
            "anomalies",
        ] {
            assert!(json.get(key).is_some(), "missing facet {}", key);
        }
        assert_eq!(json["instance_summary"]["instance_ids"][0], "11");
    }

    #[test]
    fn test_parse_error_propagates() {
        let mut events = two_by_two_by_two();
        events[0].timestamp = "yesterday".to_string();
        assert!(matches!(analyze_events(&events), Err(Error::Parse { record: 1, .. })));
    }
}
