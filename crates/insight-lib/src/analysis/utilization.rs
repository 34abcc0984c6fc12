//! CPU, memory, network, disk and uptime utilization insights

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{by_instance, column, to_gb};
use crate::models::{AggregateRecord, Metric};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CpuCategory {
    OverUtilized,
    WellUtilized,
    UnderUtilized,
}

impl CpuCategory {
    pub fn from_average(average: f64) -> Self {
        if average > 0.8 {
            CpuCategory::OverUtilized
        } else if average > 0.5 {
            CpuCategory::WellUtilized
        } else {
            CpuCategory::UnderUtilized
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CpuCategory::OverUtilized => "over-utilized",
            CpuCategory::WellUtilized => "well-utilized",
            CpuCategory::UnderUtilized => "under-utilized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityRating {
    #[serde(rename = "excellent")]
    Excellent,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "needs improvement")]
    NeedsImprovement,
}

impl ReliabilityRating {
    pub fn from_uptime(fraction: f64) -> Self {
        if fraction > 0.95 {
            ReliabilityRating::Excellent
        } else if fraction > 0.85 {
            ReliabilityRating::Good
        } else {
            ReliabilityRating::NeedsImprovement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReliabilityRating::Excellent => "excellent",
            ReliabilityRating::Good => "good",
            ReliabilityRating::NeedsImprovement => "needs improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UtilizationInsights {
    pub overall: OverallUtilization,
    pub per_instance: BTreeMap<String, InstanceUtilization>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverallUtilization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<OverallCpu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<OverallMemory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<OverallNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<OverallUptime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallCpu {
    pub average_utilization: f64,
    pub utilization_category: CpuCategory,
    pub max_utilization: f64,
    pub min_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallMemory {
    pub average_memory_gb: f64,
    pub max_memory_gb: f64,
    pub min_memory_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallNetwork {
    pub total_network_bytes: f64,
    pub total_network_gb: f64,
    pub average_daily_network_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallUptime {
    pub average_uptime_fraction: f64,
    pub uptime_percentage: f64,
    pub reliability_rating: ReliabilityRating,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceUtilization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<InstanceCpu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<InstanceMemory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<InstanceNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_io: Option<DiskIo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<InstanceUptime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_efficiency: Option<CostEfficiency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCpu {
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub std: f64,
    pub category: CpuCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMemory {
    pub average_gb: f64,
    pub max_gb: f64,
    pub min_gb: f64,
    pub std_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceNetwork {
    pub total_gb: f64,
    pub avg_daily_gb: f64,
    pub max_daily_gb: f64,
    pub min_daily_gb: f64,
    /// Only reported when both directions are present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingress_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskIo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_read_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_daily_read_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_write_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_daily_write_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceUptime {
    pub average_fraction: f64,
    pub percentage: f64,
    pub max_fraction: f64,
    pub min_fraction: f64,
    pub reliability_rating: ReliabilityRating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEfficiency {
    pub average_cost_per_cpu: f64,
    pub max_cost_per_cpu: f64,
    pub min_cost_per_cpu: f64,
}

pub fn utilization_insights(records: &[AggregateRecord]) -> UtilizationInsights {
    UtilizationInsights {
        overall: overall_utilization(records),
        per_instance: by_instance(records)
            .into_iter()
            .map(|(instance, rows)| (instance, instance_utilization(&rows)))
            .collect(),
    }
}

fn overall_utilization(records: &[AggregateRecord]) -> OverallUtilization {
    let cpu = stats::mean(&column(records, Metric::CpuUtilizationMean)).map(|average| OverallCpu {
        average_utilization: average,
        utilization_category: CpuCategory::from_average(average),
        max_utilization: stats::max(&column(records, Metric::CpuUtilizationMax)).unwrap_or(average),
        min_utilization: stats::min(&column(records, Metric::CpuUtilizationMin)).unwrap_or(average),
    });

    let memory = stats::mean(&column(records, Metric::MemoryUsedGbMean)).map(|average| OverallMemory {
        average_memory_gb: average,
        max_memory_gb: stats::max(&column(records, Metric::MemoryUsedGbMax)).unwrap_or(average),
        min_memory_gb: stats::min(&column(records, Metric::MemoryUsedGbMin)).unwrap_or(average),
    });

    let traffic = column(records, Metric::NetworkTotalBytesSum);
    let network = stats::sum(&traffic).zip(stats::mean(&traffic)).map(|(total, mean)| {
        OverallNetwork {
            total_network_bytes: total,
            total_network_gb: to_gb(total),
            average_daily_network_gb: to_gb(mean),
        }
    });

    let uptime = stats::mean(&column(records, Metric::UptimeFractionMean)).map(|average| OverallUptime {
        average_uptime_fraction: average,
        uptime_percentage: average * 100.0,
        reliability_rating: ReliabilityRating::from_uptime(average),
    });

    OverallUtilization {
        cpu,
        memory,
        network,
        uptime,
    }
}

fn instance_utilization(rows: &[&AggregateRecord]) -> InstanceUtilization {
    let series = |metric: Metric| column(rows.iter().copied(), metric);

    let cpu_values = series(Metric::CpuUtilizationMean);
    let cpu = stats::mean(&cpu_values).map(|average| InstanceCpu {
        average,
        max: stats::max(&series(Metric::CpuUtilizationMax)).unwrap_or(average),
        min: stats::min(&series(Metric::CpuUtilizationMin)).unwrap_or(average),
        std: stats::std_or_zero(&cpu_values),
        category: CpuCategory::from_average(average),
    });

    let memory_values = series(Metric::MemoryUsedGbMean);
    let memory = stats::mean(&memory_values).map(|average| InstanceMemory {
        average_gb: average,
        max_gb: stats::max(&series(Metric::MemoryUsedGbMax))
            .or_else(|| stats::max(&memory_values))
            .unwrap_or(average),
        min_gb: stats::min(&series(Metric::MemoryUsedGbMin))
            .or_else(|| stats::min(&memory_values))
            .unwrap_or(average),
        std_gb: stats::std_or_zero(&memory_values),
    });

    let traffic = series(Metric::NetworkTotalBytesSum);
    let network = stats::sum(&traffic).and_then(|total| {
        let ingress = stats::sum(&series(Metric::IngressBytesSum));
        let egress = stats::sum(&series(Metric::EgressBytesSum));
        let both = ingress.zip(egress);
        Some(InstanceNetwork {
            total_gb: to_gb(total),
            avg_daily_gb: to_gb(stats::mean(&traffic)?),
            max_daily_gb: to_gb(stats::max(&traffic)?),
            min_daily_gb: to_gb(stats::min(&traffic)?),
            ingress_gb: both.map(|(i, _)| to_gb(i)),
            egress_gb: both.map(|(_, e)| to_gb(e)),
        })
    });

    let reads = series(Metric::DiskReadBytesSum);
    let writes = series(Metric::DiskWriteBytesSum);
    let disk_io = (!reads.is_empty() || !writes.is_empty()).then(|| DiskIo {
        total_read_gb: stats::sum(&reads).map(to_gb),
        avg_daily_read_gb: stats::mean(&reads).map(to_gb),
        total_write_gb: stats::sum(&writes).map(to_gb),
        avg_daily_write_gb: stats::mean(&writes).map(to_gb),
    });

    let uptime = stats::mean(&series(Metric::UptimeFractionMean)).map(|average| InstanceUptime {
        average_fraction: average,
        percentage: average * 100.0,
        max_fraction: stats::max(&series(Metric::UptimeFractionMax)).unwrap_or(average),
        min_fraction: stats::min(&series(Metric::UptimeFractionMin)).unwrap_or(average),
        reliability_rating: ReliabilityRating::from_uptime(average),
    });

    let efficiency = series(Metric::CostPerCpuMean);
    let cost_efficiency = stats::mean(&efficiency).and_then(|average| {
        Some(CostEfficiency {
            average_cost_per_cpu: average,
            max_cost_per_cpu: stats::max(&efficiency)?,
            min_cost_per_cpu: stats::min(&efficiency)?,
        })
    });

    InstanceUtilization {
        cpu,
        memory,
        network,
        disk_io,
        uptime,
        cost_efficiency,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::record;
    use super::*;
    use crate::preprocess::BYTES_PER_GB;

    #[test]
    fn test_cpu_category_boundaries() {
        assert_eq!(CpuCategory::from_average(0.81), CpuCategory::OverUtilized);
        assert_eq!(CpuCategory::from_average(0.8), CpuCategory::WellUtilized);
        assert_eq!(CpuCategory::from_average(0.5), CpuCategory::UnderUtilized);
        assert_eq!(
            serde_json::to_string(&CpuCategory::UnderUtilized).unwrap(),
            "\"under-utilized\""
        );
    }

    #[test]
    fn test_reliability_boundaries() {
        assert_eq!(ReliabilityRating::from_uptime(0.99), ReliabilityRating::Excellent);
        assert_eq!(ReliabilityRating::from_uptime(0.95), ReliabilityRating::Good);
        assert_eq!(ReliabilityRating::from_uptime(0.85), ReliabilityRating::NeedsImprovement);
        assert_eq!(
            serde_json::to_string(&ReliabilityRating::NeedsImprovement).unwrap(),
            "\"needs improvement\""
        );
    }

    #[test]
    fn test_overall_uses_extreme_columns() {
        let mut busy = record(1, "1", 0.9, 1.0);
        busy.cpu_utilization_max = Some(0.99);
        let records = vec![busy, record(1, "2", 0.1, 1.0)];

        let overall = utilization_insights(&records).overall;
        let cpu = overall.cpu.unwrap();
        assert!((cpu.average_utilization - 0.5).abs() < 1e-12);
        assert_eq!(cpu.utilization_category, CpuCategory::UnderUtilized);
        assert_eq!(cpu.max_utilization, 0.99);
        assert_eq!(cpu.min_utilization, 0.1);

        // no memory extremes in the fixture: fall back to the average
        let memory = overall.memory.unwrap();
        assert_eq!(memory.max_memory_gb, 4.0);

        let network = overall.network.unwrap();
        assert_eq!(network.total_network_gb, 4.0);
        assert_eq!(network.average_daily_network_gb, 2.0);

        let uptime = overall.uptime.unwrap();
        assert!((uptime.uptime_percentage - 99.0).abs() < 1e-9);
        assert_eq!(uptime.reliability_rating, ReliabilityRating::Excellent);
    }

    #[test]
    fn test_per_instance_facets() {
        let mut first = record(1, "3", 0.6, 1.0);
        first.ingress_bytes_sum = Some(BYTES_PER_GB);
        first.egress_bytes_sum = Some(BYTES_PER_GB);
        first.disk_read_bytes_sum = Some(3.0 * BYTES_PER_GB);
        let second = record(2, "3", 0.8, 2.0);

        let insights = utilization_insights(&[first, second]);
        let instance = &insights.per_instance["3"];

        let cpu = instance.cpu.as_ref().unwrap();
        assert!((cpu.average - 0.7).abs() < 1e-12);
        assert_eq!(cpu.category, CpuCategory::WellUtilized);
        assert_eq!(cpu.max, 0.8);
        assert!(cpu.std > 0.0);

        let network = instance.network.as_ref().unwrap();
        assert_eq!(network.total_gb, 4.0);
        assert_eq!(network.ingress_gb, Some(1.0));

        let disk = instance.disk_io.as_ref().unwrap();
        assert_eq!(disk.total_read_gb, Some(3.0));
        assert_eq!(disk.total_write_gb, None);

        let memory = instance.memory.as_ref().unwrap();
        assert_eq!(memory.std_gb, 0.0);
        assert!(instance.cost_efficiency.is_some());
    }

    #[test]
    fn test_absent_columns_drop_facets() {
        let mut bare = record(1, "4", 0.3, 1.0);
        bare.network_total_bytes_sum = None;
        bare.uptime_fraction_mean = None;

        let insights = utilization_insights(&[bare]);
        let instance = &insights.per_instance["4"];
        assert!(instance.network.is_none());
        assert!(instance.disk_io.is_none());
        assert!(instance.uptime.is_none());
        assert!(insights.overall.network.is_none());
    }
}
