//! Core data models for the telemetry pipeline

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One telemetry sample for one VM at one timestamp, as read from the input file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Sample time in `DD-MM-YYYY HH:MM`
    pub timestamp: String,
    /// `/projects/<id>/zones/<zone>/instances/<id>`
    pub resource_global_name: Option<String>,
    pub cpu_utilization: Option<f64>,
    pub memory_used_bytes: Option<f64>,
    pub disk_read_bytes: Option<f64>,
    pub disk_write_bytes: Option<f64>,
    pub ingress_bytes: Option<f64>,
    pub egress_bytes: Option<f64>,
    pub uptime_fraction: Option<f64>,
    pub cost_usd: Option<f64>,
    pub sku_description: Option<String>,
}

/// A raw event after parsing, unit conversion and feature derivation
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub timestamp: NaiveDateTime,
    pub date: NaiveDate,
    pub hour: u32,
    /// Monday = 0
    pub day_of_week: u32,
    pub instance_id: Option<String>,
    pub project_id: Option<String>,
    pub zone: Option<String>,
    pub cpu_utilization: Option<f64>,
    pub memory_used_gb: Option<f64>,
    pub disk_read_bytes: Option<f64>,
    pub disk_write_bytes: Option<f64>,
    pub ingress_bytes: Option<f64>,
    pub egress_bytes: Option<f64>,
    pub network_total_bytes: Option<f64>,
    pub disk_total_bytes: Option<f64>,
    pub uptime_fraction: Option<f64>,
    pub cost_usd: Option<f64>,
    pub cost_per_cpu: Option<f64>,
    pub sku_category: Option<SkuCategory>,
}

/// Coarse billing-line classification derived from SKU descriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkuCategory {
    Storage,
    #[serde(rename = "Network_InterZone")]
    NetworkInterZone,
    #[serde(rename = "Network_IntraZone")]
    NetworkIntraZone,
    #[serde(rename = "Network_GoogleServices")]
    NetworkGoogleServices,
    #[serde(rename = "Network_Other")]
    NetworkOther,
    Other,
}

impl SkuCategory {
    /// Classify a free-text SKU description. First matching rule wins.
    pub fn classify(description: &str) -> Self {
        let sku = description.to_lowercase();
        let network = sku.contains("network");

        if sku.contains("vm state") || sku.contains("ssd") {
            SkuCategory::Storage
        } else if network && sku.contains("inter zone") {
            SkuCategory::NetworkInterZone
        } else if network && sku.contains("intra zone") {
            SkuCategory::NetworkIntraZone
        } else if network && sku.contains("google services") {
            SkuCategory::NetworkGoogleServices
        } else if network {
            SkuCategory::NetworkOther
        } else {
            SkuCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkuCategory::Storage => "Storage",
            SkuCategory::NetworkInterZone => "Network_InterZone",
            SkuCategory::NetworkIntraZone => "Network_IntraZone",
            SkuCategory::NetworkGoogleServices => "Network_GoogleServices",
            SkuCategory::NetworkOther => "Network_Other",
            SkuCategory::Other => "Other",
        }
    }
}

impl std::fmt::Display for SkuCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregated (date, instance_id, project_id, zone) row
///
/// Field names double as snapshot column names. A `None` statistic means the
/// group had no usable observation for it (or fewer than two, for `std`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub date: NaiveDate,
    pub instance_id: Option<String>,
    pub project_id: Option<String>,
    pub zone: Option<String>,
    pub cpu_utilization_mean: Option<f64>,
    pub cpu_utilization_std: Option<f64>,
    pub cpu_utilization_min: Option<f64>,
    pub cpu_utilization_max: Option<f64>,
    pub memory_used_gb_mean: Option<f64>,
    pub memory_used_gb_std: Option<f64>,
    pub memory_used_gb_min: Option<f64>,
    pub memory_used_gb_max: Option<f64>,
    pub disk_read_bytes_sum: Option<f64>,
    pub disk_read_bytes_mean: Option<f64>,
    pub disk_write_bytes_sum: Option<f64>,
    pub disk_write_bytes_mean: Option<f64>,
    pub ingress_bytes_sum: Option<f64>,
    pub ingress_bytes_mean: Option<f64>,
    pub egress_bytes_sum: Option<f64>,
    pub egress_bytes_mean: Option<f64>,
    pub network_total_bytes_sum: Option<f64>,
    pub network_total_bytes_mean: Option<f64>,
    pub disk_total_bytes_sum: Option<f64>,
    pub disk_total_bytes_mean: Option<f64>,
    pub uptime_fraction_mean: Option<f64>,
    pub uptime_fraction_min: Option<f64>,
    pub uptime_fraction_max: Option<f64>,
    pub cost_usd_sum: Option<f64>,
    pub cost_usd_mean: Option<f64>,
    pub cost_usd_max: Option<f64>,
    pub cost_per_cpu_mean: Option<f64>,
    pub sku_category: Option<SkuCategory>,
}

impl AggregateRecord {
    /// An aggregate row with only its grouping key set
    pub fn empty(
        date: NaiveDate,
        instance_id: Option<String>,
        project_id: Option<String>,
        zone: Option<String>,
    ) -> Self {
        Self {
            date,
            instance_id,
            project_id,
            zone,
            cpu_utilization_mean: None,
            cpu_utilization_std: None,
            cpu_utilization_min: None,
            cpu_utilization_max: None,
            memory_used_gb_mean: None,
            memory_used_gb_std: None,
            memory_used_gb_min: None,
            memory_used_gb_max: None,
            disk_read_bytes_sum: None,
            disk_read_bytes_mean: None,
            disk_write_bytes_sum: None,
            disk_write_bytes_mean: None,
            ingress_bytes_sum: None,
            ingress_bytes_mean: None,
            egress_bytes_sum: None,
            egress_bytes_mean: None,
            network_total_bytes_sum: None,
            network_total_bytes_mean: None,
            disk_total_bytes_sum: None,
            disk_total_bytes_mean: None,
            uptime_fraction_mean: None,
            uptime_fraction_min: None,
            uptime_fraction_max: None,
            cost_usd_sum: None,
            cost_usd_mean: None,
            cost_usd_max: None,
            cost_per_cpu_mean: None,
            sku_category: None,
        }
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        metric.value(self)
    }
}

macro_rules! metrics {
    ($($variant:ident => $field:ident),+ $(,)?) => {
        /// Numeric columns of [`AggregateRecord`]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Metric {
            $($variant),+
        }

        impl Metric {
            /// Every numeric column, in snapshot column order
            pub const ALL: &'static [Metric] = &[$(Metric::$variant),+];

            /// Snapshot column name
            pub fn name(&self) -> &'static str {
                match self {
                    $(Metric::$variant => stringify!($field)),+
                }
            }

            pub fn value(&self, record: &AggregateRecord) -> Option<f64> {
                match self {
                    $(Metric::$variant => record.$field),+
                }
            }
        }
    };
}

metrics! {
    CpuUtilizationMean => cpu_utilization_mean,
    CpuUtilizationStd => cpu_utilization_std,
    CpuUtilizationMin => cpu_utilization_min,
    CpuUtilizationMax => cpu_utilization_max,
    MemoryUsedGbMean => memory_used_gb_mean,
    MemoryUsedGbStd => memory_used_gb_std,
    MemoryUsedGbMin => memory_used_gb_min,
    MemoryUsedGbMax => memory_used_gb_max,
    DiskReadBytesSum => disk_read_bytes_sum,
    DiskReadBytesMean => disk_read_bytes_mean,
    DiskWriteBytesSum => disk_write_bytes_sum,
    DiskWriteBytesMean => disk_write_bytes_mean,
    IngressBytesSum => ingress_bytes_sum,
    IngressBytesMean => ingress_bytes_mean,
    EgressBytesSum => egress_bytes_sum,
    EgressBytesMean => egress_bytes_mean,
    NetworkTotalBytesSum => network_total_bytes_sum,
    NetworkTotalBytesMean => network_total_bytes_mean,
    DiskTotalBytesSum => disk_total_bytes_sum,
    DiskTotalBytesMean => disk_total_bytes_mean,
    UptimeFractionMean => uptime_fraction_mean,
    UptimeFractionMin => uptime_fraction_min,
    UptimeFractionMax => uptime_fraction_max,
    CostUsdSum => cost_usd_sum,
    CostUsdMean => cost_usd_mean,
    CostUsdMax => cost_usd_max,
    CostPerCpuMean => cost_per_cpu_mean,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_priority_order() {
        assert_eq!(SkuCategory::classify("SSD backed VM state"), SkuCategory::Storage);
        assert_eq!(
            SkuCategory::classify("Network Inter Zone Egress"),
            SkuCategory::NetworkInterZone
        );
        assert_eq!(
            SkuCategory::classify("network intra zone traffic"),
            SkuCategory::NetworkIntraZone
        );
        assert_eq!(
            SkuCategory::classify("Network Google Services Egress"),
            SkuCategory::NetworkGoogleServices
        );
        assert_eq!(
            SkuCategory::classify("Network Internet Egress"),
            SkuCategory::NetworkOther
        );
        assert_eq!(SkuCategory::classify("E2 Instance Core"), SkuCategory::Other);
    }

    #[test]
    fn test_sku_storage_wins_over_network() {
        assert_eq!(
            SkuCategory::classify("Network SSD inter zone"),
            SkuCategory::Storage
        );
    }

    #[test]
    fn test_sku_classification_is_total() {
        let inputs = ["", "   ", "ÜNICODE", "inter zone", "google services", "NETWORK"];
        for input in inputs {
            let category = SkuCategory::classify(input);
            assert!(matches!(
                category,
                SkuCategory::Storage
                    | SkuCategory::NetworkInterZone
                    | SkuCategory::NetworkIntraZone
                    | SkuCategory::NetworkGoogleServices
                    | SkuCategory::NetworkOther
                    | SkuCategory::Other
            ));
        }
        // zone keywords without "network" are not network lines
        assert_eq!(SkuCategory::classify("inter zone"), SkuCategory::Other);
    }

    #[test]
    fn test_sku_category_serialized_names() {
        let json = serde_json::to_string(&SkuCategory::NetworkGoogleServices).unwrap();
        assert_eq!(json, "\"Network_GoogleServices\"");
        assert_eq!(SkuCategory::NetworkOther.to_string(), "Network_Other");
    }

    #[test]
    fn test_metric_names_match_fields() {
        let mut record = AggregateRecord::empty(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            Some("1".to_string()),
            None,
            None,
        );
        record.cost_usd_sum = Some(4.5);

        assert_eq!(Metric::CostUsdSum.name(), "cost_usd_sum");
        assert_eq!(record.value(Metric::CostUsdSum), Some(4.5));
        assert_eq!(record.value(Metric::CpuUtilizationMean), None);
        assert_eq!(Metric::ALL.len(), 27);
    }
}
