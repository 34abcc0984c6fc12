//! Fleet and per-instance cost totals with a monthly projection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{by_instance, column};
use crate::models::{AggregateRecord, Metric};
use crate::stats;

/// Days used to project the monthly cost from the mean daily cost
pub const PROJECTION_DAYS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallCost>,
    pub per_instance: BTreeMap<String, InstanceCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallCost {
    pub total_cost: f64,
    pub average_daily_cost_per_instance: f64,
    pub max_daily_cost: f64,
    pub min_daily_cost: f64,
    pub cost_std_deviation: f64,
    pub projected_monthly_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_cost_per_cpu_utilization: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCost {
    pub total_cost: f64,
    pub avg_daily_cost: f64,
    pub max_daily_cost: f64,
    pub min_daily_cost: f64,
}

impl InstanceCost {
    fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            total_cost: stats::sum(values)?,
            avg_daily_cost: stats::mean(values)?,
            max_daily_cost: stats::max(values)?,
            min_daily_cost: stats::min(values)?,
        })
    }
}

/// Cost totals and projection; `None` when no record carries a cost
pub fn cost_analysis(records: &[AggregateRecord]) -> Option<CostAnalysis> {
    let costs = column(records, Metric::CostUsdSum);
    if costs.is_empty() {
        return None;
    }

    let average = stats::mean(&costs)?;
    let overall = OverallCost {
        total_cost: stats::sum(&costs)?,
        average_daily_cost_per_instance: average,
        max_daily_cost: stats::max(&costs)?,
        min_daily_cost: stats::min(&costs)?,
        cost_std_deviation: stats::std_or_zero(&costs),
        projected_monthly_cost: average * PROJECTION_DAYS,
        average_cost_per_cpu_utilization: stats::mean(&column(records, Metric::CostPerCpuMean)),
    };

    let per_instance = by_instance(records)
        .into_iter()
        .filter_map(|(instance, rows)| {
            let values = column(rows.iter().copied(), Metric::CostUsdSum);
            InstanceCost::from_values(&values).map(|cost| (instance, cost))
        })
        .collect();

    Some(CostAnalysis {
        overall: Some(overall),
        per_instance,
    })
}
