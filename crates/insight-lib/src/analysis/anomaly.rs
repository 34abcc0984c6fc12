//! Per-instance outlier detection with the interquartile-range rule

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::by_instance;
use crate::models::{AggregateRecord, Metric};
use crate::stats;

pub const IQR_MULTIPLIER: f64 = 1.5;

/// Checked metrics and the label they are reported under
pub const ANOMALY_METRICS: [(Metric, &str); 4] = [
    (Metric::CostUsdSum, "Cost"),
    (Metric::CpuUtilizationMean, "CPU Utilization"),
    (Metric::MemoryUsedGbMean, "Memory Usage"),
    (Metric::NetworkTotalBytesSum, "Network Traffic"),
];

/// Fewer observations than this are not tested
const MIN_OBSERVATIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnomaly {
    pub count: usize,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Metric label -> flagged observations
pub type InstanceAnomalies = BTreeMap<String, MetricAnomaly>;

pub fn detect_anomalies(records: &[AggregateRecord]) -> BTreeMap<String, InstanceAnomalies> {
    by_instance(records)
        .into_iter()
        .filter_map(|(instance, rows)| {
            let found: InstanceAnomalies = ANOMALY_METRICS
                .iter()
                .filter_map(|(metric, label)| {
                    metric_anomaly(&rows, *metric).map(|anomaly| (label.to_string(), anomaly))
                })
                .collect();
            (!found.is_empty()).then_some((instance, found))
        })
        .collect()
}

fn metric_anomaly(rows: &[&AggregateRecord], metric: Metric) -> Option<MetricAnomaly> {
    let observations: Vec<(NaiveDate, f64)> = rows
        .iter()
        .filter_map(|r| metric.value(r).map(|v| (r.date, v)))
        .collect();
    if observations.len() < MIN_OBSERVATIONS {
        return None;
    }

    let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
    let (lower_bound, upper_bound) = iqr_bounds(&values)?;

    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = observations
        .into_iter()
        .filter(|(_, v)| *v < lower_bound || *v > upper_bound)
        .unzip();
    if dates.is_empty() {
        return None;
    }

    Some(MetricAnomaly {
        count: dates.len(),
        dates,
        values,
        lower_bound,
        upper_bound,
    })
}

/// `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
pub(crate) fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let q1 = stats::quantile(values, 0.25)?;
    let q3 = stats::quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - IQR_MULTIPLIER * iqr, q3 + IQR_MULTIPLIER * iqr))
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{day, record};
    use super::*;

    fn cost_series(costs: &[f64]) -> Vec<AggregateRecord> {
        costs
            .iter()
            .enumerate()
            .map(|(i, cost)| record(i as u32 + 1, "8", 0.5, *cost))
            .collect()
    }

    #[test]
    fn test_iqr_bounds() {
        let (lower, upper) = iqr_bounds(&[10.0, 11.0, 9.0, 10.0, 12.0, 1000.0]).unwrap();
        assert_eq!(lower, 7.375);
        assert_eq!(upper, 14.375);
    }

    #[test]
    fn test_single_outlier_flagged() {
        let records = cost_series(&[10.0, 11.0, 9.0, 10.0, 12.0, 1000.0]);
        let anomalies = detect_anomalies(&records);

        let cost = &anomalies["8"]["Cost"];
        assert_eq!(cost.count, 1);
        assert_eq!(cost.values, vec![1000.0]);
        assert_eq!(cost.dates, vec![day(6)]);
        assert_eq!(cost.lower_bound, 7.375);
        assert_eq!(cost.upper_bound, 14.375);

        // constant CPU, memory and network have nothing outside the bounds
        assert_eq!(anomalies["8"].len(), 1);
    }

    #[test]
    fn test_three_points_are_not_tested() {
        let records = cost_series(&[1.0, 1.0, 500.0]);
        assert!(detect_anomalies(&records).is_empty());
    }

    #[test]
    fn test_quiet_instances_are_omitted() {
        let records = cost_series(&[5.0, 6.0, 4.0, 5.0]);
        assert!(detect_anomalies(&records).is_empty());
    }
}
