//! Pairwise Pearson correlations between aggregate columns

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::is_present;
use crate::models::{AggregateRecord, Metric};
use crate::stats;

/// Columns considered for the correlation matrix, in reporting order
pub const CORRELATION_CANDIDATES: [Metric; 10] = [
    Metric::CpuUtilizationMean,
    Metric::MemoryUsedGbMean,
    Metric::DiskReadBytesSum,
    Metric::DiskWriteBytesSum,
    Metric::IngressBytesSum,
    Metric::EgressBytesSum,
    Metric::NetworkTotalBytesSum,
    Metric::UptimeFractionMean,
    Metric::CostUsdSum,
    Metric::CostPerCpuMean,
];

/// Absolute coefficient above which a pair is reported as strong
pub const STRONG_CORRELATION_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationAnalysis {
    /// column -> row -> coefficient; undefined coefficients are 0
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, f64>>,
    pub strong_correlations: Vec<StrongCorrelation>,
    pub cost_correlations: Vec<CostCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongCorrelation {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCorrelation {
    pub feature: String,
    pub correlation_with_cost: f64,
}

pub fn correlation_analysis(records: &[AggregateRecord]) -> Option<CorrelationAnalysis> {
    let columns: Vec<Metric> = CORRELATION_CANDIDATES
        .iter()
        .copied()
        .filter(|metric| is_present(records, *metric))
        .collect();
    if columns.len() < 2 {
        return None;
    }

    let series: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|metric| records.iter().map(|r| metric.value(r)).collect())
        .collect();

    let n = columns.len();
    let mut coefficients = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = stats::pearson(&series[i], &series[j]).unwrap_or(0.0);
            coefficients[i][j] = r;
            coefficients[j][i] = r;
        }
    }

    let mut correlation_matrix: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (j, column) in columns.iter().enumerate() {
        let rows = columns
            .iter()
            .enumerate()
            .map(|(i, row)| (row.name().to_string(), coefficients[i][j]))
            .collect();
        correlation_matrix.insert(column.name().to_string(), rows);
    }

    let mut strong_correlations = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let r = coefficients[i][j];
            if r.abs() > STRONG_CORRELATION_THRESHOLD {
                strong_correlations.push(StrongCorrelation {
                    feature1: columns[i].name().to_string(),
                    feature2: columns[j].name().to_string(),
                    correlation: r,
                });
            }
        }
    }

    let mut cost_correlations = Vec::new();
    if let Some(cost) = columns.iter().position(|m| *m == Metric::CostUsdSum) {
        cost_correlations = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != cost)
            .map(|(i, metric)| CostCorrelation {
                feature: metric.name().to_string(),
                correlation_with_cost: coefficients[i][cost],
            })
            .collect();
        // stable sort keeps candidate order among equal coefficients
        cost_correlations.sort_by(|a, b| {
            b.correlation_with_cost
                .partial_cmp(&a.correlation_with_cost)
                .unwrap_or(Ordering::Equal)
        });
    }

    Some(CorrelationAnalysis {
        correlation_matrix,
        strong_correlations,
        cost_correlations,
    })
}
