//! Overall (endpoint) and per-instance (split-halves) trends

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{by_instance, column, to_gb};
use crate::models::{AggregateRecord, Metric};
use crate::stats;

/// Percent change beyond which a series counts as moving
pub const TREND_THRESHOLD_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    pub fn from_percent_change(percent: f64) -> Self {
        if percent > TREND_THRESHOLD_PERCENT {
            TrendDirection::Increasing
        } else if percent < -TREND_THRESHOLD_PERCENT {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallTrends>,
    pub per_instance: BTreeMap<String, InstanceTrends>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_days: Option<usize>,
}

/// Comparison of the first and last value of a daily series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointTrend {
    pub start_value: f64,
    pub end_value: f64,
    pub percent_change: f64,
    pub trend: TrendDirection,
}

impl EndpointTrend {
    fn between(first: Option<f64>, last: Option<f64>) -> Option<Self> {
        let (first, last) = (first?, last?);
        if first == 0.0 {
            return None;
        }
        let percent_change = (last - first) / first * 100.0;
        Some(Self {
            start_value: first,
            end_value: last,
            percent_change,
            trend: TrendDirection::from_percent_change(percent_change),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallTrends {
    pub date_range: TrendDateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<EndpointTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_gb: Option<EndpointTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_cost: Option<EndpointTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_fraction: Option<EndpointTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_traffic: Option<EndpointTrend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTrend {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub trend: TrendDirection,
}

impl SeriesTrend {
    fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: stats::mean(values)?,
            median: stats::median(values)?,
            min: stats::min(values)?,
            max: stats::max(values)?,
            std: stats::std_or_zero(values),
            trend: split_halves_trend(values),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTrend {
    pub total: f64,
    pub mean_daily: f64,
    pub median_daily: f64,
    pub min_daily: f64,
    pub max_daily: f64,
    pub std: f64,
    pub trend: TrendDirection,
}

impl CostTrend {
    fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            total: stats::sum(values)?,
            mean_daily: stats::mean(values)?,
            median_daily: stats::median(values)?,
            min_daily: stats::min(values)?,
            max_daily: stats::max(values)?,
            std: stats::std_or_zero(values),
            trend: split_halves_trend(values),
        })
    }
}

/// Byte volumes, reported in GB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTrend {
    pub total_gb: f64,
    pub mean_daily_gb: f64,
    pub median_daily_gb: f64,
    pub min_daily_gb: f64,
    pub max_daily_gb: f64,
    pub trend: TrendDirection,
}

impl VolumeTrend {
    fn from_bytes(values: &[f64]) -> Option<Self> {
        Some(Self {
            total_gb: to_gb(stats::sum(values)?),
            mean_daily_gb: to_gb(stats::mean(values)?),
            median_daily_gb: to_gb(stats::median(values)?),
            min_daily_gb: to_gb(stats::min(values)?),
            max_daily_gb: to_gb(stats::max(values)?),
            // scaling does not change the direction
            trend: split_halves_trend(values),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceTrends {
    pub date_range: TrendDateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_utilization: Option<SeriesTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage_gb: Option<SeriesTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_fraction: Option<SeriesTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_traffic: Option<VolumeTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_read: Option<VolumeTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_write: Option<VolumeTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_ingress: Option<VolumeTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_egress: Option<VolumeTrend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_efficiency: Option<SeriesTrend>,
}

/// Direction of a chronological series by comparing the mean of its
/// first half `[0, n/2)` against the second half `[n/2, n)`
pub fn split_halves_trend(values: &[f64]) -> TrendDirection {
    if values.len() < 2 {
        return TrendDirection::InsufficientData;
    }

    let (first, second) = values.split_at(values.len() / 2);
    let (Some(first_mean), Some(second_mean)) = (stats::mean(first), stats::mean(second)) else {
        return TrendDirection::InsufficientData;
    };
    if first_mean == 0.0 {
        return TrendDirection::Stable;
    }

    TrendDirection::from_percent_change((second_mean - first_mean) / first_mean * 100.0)
}

pub fn trend_analysis(records: &[AggregateRecord]) -> TrendAnalysis {
    TrendAnalysis {
        overall: overall_trends(records),
        per_instance: by_instance(records)
            .into_iter()
            .filter_map(|(instance, rows)| instance_trends(&rows).map(|t| (instance, t)))
            .collect(),
    }
}

struct DailyTotals {
    cpu: Option<f64>,
    memory: Option<f64>,
    cost: Option<f64>,
    uptime: Option<f64>,
    network: Option<f64>,
}

fn overall_trends(records: &[AggregateRecord]) -> Option<OverallTrends> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&AggregateRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(record);
    }
    if by_date.len() < 2 {
        return None;
    }

    let daily: Vec<(NaiveDate, DailyTotals)> = by_date
        .into_iter()
        .map(|(date, rows)| {
            let totals = DailyTotals {
                cpu: stats::mean(&column(rows.iter().copied(), Metric::CpuUtilizationMean)),
                memory: stats::mean(&column(rows.iter().copied(), Metric::MemoryUsedGbMean)),
                cost: stats::sum(&column(rows.iter().copied(), Metric::CostUsdSum)),
                uptime: stats::mean(&column(rows.iter().copied(), Metric::UptimeFractionMean)),
                network: stats::sum(&column(rows.iter().copied(), Metric::NetworkTotalBytesSum)),
            };
            (date, totals)
        })
        .collect();

    let (start_date, first) = daily.first()?;
    let (end_date, last) = daily.last()?;

    Some(OverallTrends {
        date_range: TrendDateRange {
            start_date: *start_date,
            end_date: *end_date,
            total_days: None,
        },
        cpu_utilization: EndpointTrend::between(first.cpu, last.cpu),
        memory_usage_gb: EndpointTrend::between(first.memory, last.memory),
        daily_cost: EndpointTrend::between(first.cost, last.cost),
        uptime_fraction: EndpointTrend::between(first.uptime, last.uptime),
        network_traffic: EndpointTrend::between(first.network, last.network),
    })
}

fn instance_trends(rows: &[&AggregateRecord]) -> Option<InstanceTrends> {
    let start_date = rows.first()?.date;
    let end_date = rows.last()?.date;
    let series = |metric: Metric| column(rows.iter().copied(), metric);

    Some(InstanceTrends {
        date_range: TrendDateRange {
            start_date,
            end_date,
            total_days: Some(rows.len()),
        },
        cpu_utilization: SeriesTrend::from_values(&series(Metric::CpuUtilizationMean)),
        memory_usage_gb: SeriesTrend::from_values(&series(Metric::MemoryUsedGbMean)),
        cost: CostTrend::from_values(&series(Metric::CostUsdSum)),
        uptime_fraction: SeriesTrend::from_values(&series(Metric::UptimeFractionMean)),
        network_traffic: VolumeTrend::from_bytes(&series(Metric::NetworkTotalBytesSum)),
        disk_read: VolumeTrend::from_bytes(&series(Metric::DiskReadBytesSum)),
        disk_write: VolumeTrend::from_bytes(&series(Metric::DiskWriteBytesSum)),
        network_ingress: VolumeTrend::from_bytes(&series(Metric::IngressBytesSum)),
        network_egress: VolumeTrend::from_bytes(&series(Metric::EgressBytesSum)),
        cost_efficiency: SeriesTrend::from_values(&series(Metric::CostPerCpuMean)),
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{day, record};
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(TrendDirection::from_percent_change(5.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::from_percent_change(5.01), TrendDirection::Increasing);
        assert_eq!(TrendDirection::from_percent_change(-5.0), TrendDirection::Stable);
        assert_eq!(TrendDirection::from_percent_change(-5.01), TrendDirection::Decreasing);
    }

    #[test]
    fn test_split_halves() {
        assert_eq!(split_halves_trend(&[1.0]), TrendDirection::InsufficientData);
        assert_eq!(split_halves_trend(&[]), TrendDirection::InsufficientData);
        assert_eq!(split_halves_trend(&[1.0, 1.0, 2.0, 2.0]), TrendDirection::Increasing);
        assert_eq!(split_halves_trend(&[2.0, 1.0]), TrendDirection::Decreasing);
        // odd length: the middle value belongs to the second half
        assert_eq!(split_halves_trend(&[10.0, 10.0, 10.4]), TrendDirection::Stable);
        assert_eq!(split_halves_trend(&[0.0, 0.0, 5.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_overall_endpoints() {
        let records = vec![
            record(1, "1", 0.2, 10.0),
            record(1, "2", 0.4, 10.0),
            record(2, "1", 0.9, 50.0),
            record(3, "1", 0.3, 10.5),
            record(3, "2", 0.3, 10.0),
        ];
        let overall = trend_analysis(&records).overall.unwrap();

        assert_eq!(overall.date_range.start_date, day(1));
        assert_eq!(overall.date_range.end_date, day(3));
        assert_eq!(overall.date_range.total_days, None);

        // endpoints only, the spike on day 2 is ignored
        let cost = overall.daily_cost.unwrap();
        assert_eq!(cost.start_value, 20.0);
        assert_eq!(cost.end_value, 20.5);
        assert!((cost.percent_change - 2.5).abs() < 1e-9);
        assert_eq!(cost.trend, TrendDirection::Stable);

        let cpu = overall.cpu_utilization.unwrap();
        assert!((cpu.start_value - 0.3).abs() < 1e-12);
        assert_eq!(cpu.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_overall_needs_two_dates() {
        let records = vec![record(1, "1", 0.2, 1.0), record(1, "2", 0.3, 1.0)];
        assert!(trend_analysis(&records).overall.is_none());
    }

    #[test]
    fn test_overall_skips_zero_start() {
        let records = vec![record(1, "1", 0.2, 0.0), record(2, "1", 0.3, 4.0)];
        let overall = trend_analysis(&records).overall.unwrap();
        assert!(overall.daily_cost.is_none());
        assert!(overall.cpu_utilization.is_some());
    }

    #[test]
    fn test_per_instance_facets() {
        let records = vec![
            record(1, "7", 0.2, 1.0),
            record(2, "7", 0.2, 1.0),
            record(3, "7", 0.6, 3.0),
            record(4, "7", 0.6, 3.0),
        ];
        let trends = trend_analysis(&records);
        let instance = &trends.per_instance["7"];

        assert_eq!(instance.date_range.total_days, Some(4));
        assert_eq!(
            instance.cpu_utilization.as_ref().unwrap().trend,
            TrendDirection::Increasing
        );

        let cost = instance.cost.as_ref().unwrap();
        assert_eq!(cost.total, 8.0);
        assert_eq!(cost.mean_daily, 2.0);
        assert_eq!(cost.trend, TrendDirection::Increasing);

        let network = instance.network_traffic.as_ref().unwrap();
        assert_eq!(network.total_gb, 8.0);
        assert_eq!(network.mean_daily_gb, 2.0);
        assert_eq!(network.trend, TrendDirection::Stable);

        assert!(instance.disk_read.is_none());
        assert!(instance.network_ingress.is_none());
    }

    #[test]
    fn test_single_record_is_insufficient() {
        let trends = trend_analysis(&[record(1, "7", 0.2, 1.0)]);
        let cpu = trends.per_instance["7"].cpu_utilization.as_ref().unwrap();
        assert_eq!(cpu.trend, TrendDirection::InsufficientData);
        assert_eq!(cpu.std, 0.0);
    }

    #[test]
    fn test_direction_serializes_snake_case() {
        let json = serde_json::to_string(&TrendDirection::InsufficientData).unwrap();
        assert_eq!(json, "\"insufficient_data\"");
    }
}
