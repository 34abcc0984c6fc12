//! Instance summary, descriptive statistics and per-instance profiles

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{by_instance, column, to_gb};
use crate::models::{AggregateRecord, Metric};
use crate::stats;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub total_instances: usize,
    /// Sorted instance identifiers
    pub instance_ids: Vec<String>,
    pub records_per_instance: BTreeMap<String, usize>,
    pub date_range: DateSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Summary statistics of one column over its non-null values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation, 0 with a single value
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
}

impl DescriptiveStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: stats::mean(values)?,
            median: stats::median(values)?,
            std: stats::std_or_zero(values),
            min: stats::min(values)?,
            max: stats::max(values)?,
            q25: stats::quantile(values, 0.25)?,
            q75: stats::quantile(values, 0.75)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceProfile {
    pub total_records: usize,
    pub date_range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_cpu_utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_memory_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_daily_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_uptime_fraction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_network_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Distinct instances, record counts and the global date span
pub fn instance_summary(records: &[AggregateRecord]) -> Option<InstanceSummary> {
    let start = records.iter().map(|r| r.date).min()?;
    let end = records.iter().map(|r| r.date).max()?;
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| r.date).collect();

    let records_per_instance: BTreeMap<String, usize> = by_instance(records)
        .into_iter()
        .map(|(instance, rows)| (instance, rows.len()))
        .collect();

    Some(InstanceSummary {
        total_instances: records_per_instance.len(),
        instance_ids: records_per_instance.keys().cloned().collect(),
        records_per_instance,
        date_range: DateSpan {
            start,
            end,
            total_days: days.len(),
        },
    })
}

/// Descriptive statistics for every present numeric column
pub fn descriptive_stats(records: &[AggregateRecord]) -> BTreeMap<String, DescriptiveStats> {
    Metric::ALL
        .iter()
        .filter_map(|metric| {
            let values = column(records, *metric);
            DescriptiveStats::from_values(&values).map(|stats| (metric.name().to_string(), stats))
        })
        .collect()
}

pub fn per_instance_analysis(records: &[AggregateRecord]) -> BTreeMap<String, InstanceProfile> {
    by_instance(records)
        .into_iter()
        .filter_map(|(instance, rows)| {
            let first = rows.first()?;
            let last = rows.last()?;

            let cost = column(rows.iter().copied(), Metric::CostUsdSum);
            let network = column(rows.iter().copied(), Metric::NetworkTotalBytesSum);

            let profile = InstanceProfile {
                total_records: rows.len(),
                date_range: DateRange {
                    start: first.date,
                    end: last.date,
                },
                avg_cpu_utilization: stats::mean(&column(
                    rows.iter().copied(),
                    Metric::CpuUtilizationMean,
                )),
                avg_memory_gb: stats::mean(&column(rows.iter().copied(), Metric::MemoryUsedGbMean)),
                total_cost: stats::sum(&cost),
                avg_daily_cost: stats::mean(&cost),
                avg_uptime_fraction: stats::mean(&column(
                    rows.iter().copied(),
                    Metric::UptimeFractionMean,
                )),
                total_network_gb: stats::sum(&network).map(to_gb),
                zone: first.zone.clone(),
                project_id: first.project_id.clone(),
            };
            Some((instance, profile))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{day, record};
    use super::*;

    #[test]
    fn test_instance_summary() {
        let mut orphan = record(3, "x", 0.1, 1.0);
        orphan.instance_id = None;
        let records = vec![
            record(2, "9", 0.1, 1.0),
            record(1, "10", 0.2, 1.0),
            record(2, "10", 0.3, 1.0),
            orphan,
        ];

        let summary = instance_summary(&records).unwrap();
        assert_eq!(summary.total_instances, 3);
        assert_eq!(summary.instance_ids, vec!["10", "9", "unknown"]);
        assert_eq!(summary.records_per_instance["10"], 2);
        assert_eq!(summary.date_range.start, day(1));
        assert_eq!(summary.date_range.end, day(3));
        assert_eq!(summary.date_range.total_days, 3);
    }

    #[test]
    fn test_descriptive_stats_skip_absent_columns() {
        let records = vec![record(1, "1", 0.2, 1.0), record(2, "1", 0.4, 3.0)];
        let stats = descriptive_stats(&records);

        assert!(stats.contains_key("cpu_utilization_mean"));
        assert!(!stats.contains_key("disk_read_bytes_sum"));
        assert!(!stats.contains_key("cpu_utilization_std"));

        let cost = &stats["cost_usd_sum"];
        assert_eq!(cost.mean, 2.0);
        assert_eq!(cost.median, 2.0);
        assert!((cost.std - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_descriptive_stats_single_value_std_is_zero() {
        let stats = descriptive_stats(&[record(1, "1", 0.2, 1.0)]);
        assert_eq!(stats["cost_usd_sum"].std, 0.0);
    }

    #[test]
    fn test_per_instance_profile() {
        let mut late = record(3, "5", 0.6, 3.0);
        late.zone = Some("europe-west1-b".to_string());
        let records = vec![late, record(1, "5", 0.2, 1.0), record(2, "5", 0.4, 2.0)];

        let profiles = per_instance_analysis(&records);
        let profile = &profiles["5"];

        assert_eq!(profile.total_records, 3);
        assert_eq!(profile.date_range.start, day(1));
        assert_eq!(profile.date_range.end, day(3));
        assert!((profile.avg_cpu_utilization.unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(profile.total_cost, Some(6.0));
        assert_eq!(profile.avg_daily_cost, Some(2.0));
        assert_eq!(profile.total_network_gb, Some(6.0));
        // first observed chronologically
        assert_eq!(profile.zone.as_deref(), Some("us-central1-a"));
        assert_eq!(profile.project_id.as_deref(), Some("demo-project"));
    }
}
