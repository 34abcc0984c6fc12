//! Raw telemetry preprocessing
//!
//! Converts per-sample [`RawEvent`]s into one [`AggregateRecord`] per
//! (date, instance_id, project_id, zone) group:
//! - timestamp parsing and calendar features
//! - unit conversion and derived efficiency/volume features
//! - resource name decomposition and SKU classification
//! - grouped aggregation, sorted by date then instance

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{AggregateRecord, NormalizedEvent, RawEvent, SkuCategory};
use crate::{snapshot, stats};

/// Source timestamp format (`DD-MM-YYYY HH:MM`)
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Bytes per gigabyte (2^30)
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Added to CPU utilization before dividing cost by it.
///
/// Keeps cost-per-CPU finite at zero utilization while staying monotonic
/// for near-zero values.
pub const COST_PER_CPU_EPSILON: f64 = 0.001;

type GroupKey = (NaiveDate, Option<String>, Option<String>, Option<String>);

/// Preprocessing entry point with an optional snapshot side effect
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    snapshot_path: Option<PathBuf>,
}

impl Preprocessor {
    /// Create a preprocessor that performs no I/O
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist the aggregate table to `path` after each run
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn run(&self, events: &[RawEvent]) -> Result<Vec<AggregateRecord>> {
        let records = preprocess(events)?;
        if let Some(path) = &self.snapshot_path {
            snapshot::write_snapshot(&records, path)?;
        }
        Ok(records)
    }
}

/// Preprocess a batch without persisting anything
pub fn preprocess(events: &[RawEvent]) -> Result<Vec<AggregateRecord>> {
    let normalized = normalize(events)?;
    Ok(aggregate(&normalized))
}

/// Parse, validate and derive features for every event of a batch
///
/// A single malformed timestamp or invalid value aborts the whole batch.
pub fn normalize(events: &[RawEvent]) -> Result<Vec<NormalizedEvent>> {
    events
        .iter()
        .enumerate()
        .map(|(index, event)| normalize_event(index + 1, event))
        .collect()
}

fn normalize_event(record: usize, event: &RawEvent) -> Result<NormalizedEvent> {
    let timestamp = NaiveDateTime::parse_from_str(event.timestamp.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| Error::Parse {
            record,
            message: format!(
                "timestamp {:?} does not match {}: {}",
                event.timestamp, TIMESTAMP_FORMAT, e
            ),
        })?;

    let checked = |field: &str, value: Option<f64>| -> Result<Option<f64>> {
        match value {
            Some(v) if !v.is_finite() => Err(Error::data(
                field,
                format!("record {}: non-finite value {}", record, v),
            )),
            Some(v) if v < 0.0 => Err(Error::data(
                field,
                format!("record {}: negative value {}", record, v),
            )),
            other => Ok(other),
        }
    };

    let cpu_utilization = checked("cpu_utilization", event.cpu_utilization)?;
    let memory_used_bytes = checked("memory_used_bytes", event.memory_used_bytes)?;
    let disk_read_bytes = checked("disk_read_bytes", event.disk_read_bytes)?;
    let disk_write_bytes = checked("disk_write_bytes", event.disk_write_bytes)?;
    let ingress_bytes = checked("ingress_bytes", event.ingress_bytes)?;
    let egress_bytes = checked("egress_bytes", event.egress_bytes)?;
    let uptime_fraction = checked("uptime_fraction", event.uptime_fraction)?;
    let cost_usd = checked("cost_usd", event.cost_usd)?;

    let resource = event
        .resource_global_name
        .as_deref()
        .map(ResourceName::parse)
        .unwrap_or_default();

    Ok(NormalizedEvent {
        timestamp,
        date: timestamp.date(),
        hour: timestamp.hour(),
        day_of_week: timestamp.weekday().num_days_from_monday(),
        instance_id: resource.instance_id,
        project_id: resource.project_id,
        zone: resource.zone,
        cpu_utilization,
        memory_used_gb: memory_used_bytes.map(|b| b / BYTES_PER_GB),
        disk_read_bytes,
        disk_write_bytes,
        ingress_bytes,
        egress_bytes,
        network_total_bytes: add(ingress_bytes, egress_bytes),
        disk_total_bytes: add(disk_read_bytes, disk_write_bytes),
        uptime_fraction,
        cost_usd,
        cost_per_cpu: cost_per_cpu(cost_usd, cpu_utilization),
        sku_category: event.sku_description.as_deref().map(SkuCategory::classify),
    })
}

/// Cost divided by epsilon-shifted CPU utilization
pub fn cost_per_cpu(cost_usd: Option<f64>, cpu_utilization: Option<f64>) -> Option<f64> {
    Some(cost_usd? / (cpu_utilization? + COST_PER_CPU_EPSILON))
}

fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

/// Identifiers extracted from a `resource_global_name`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceName {
    pub instance_id: Option<String>,
    pub zone: Option<String>,
    pub project_id: Option<String>,
}

struct ResourcePatterns {
    instance: Regex,
    zone: Regex,
    project: Regex,
}

fn patterns() -> &'static ResourcePatterns {
    static PATTERNS: OnceLock<ResourcePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ResourcePatterns {
        instance: Regex::new(r"/instances/(\d+)").expect("static instance pattern"),
        zone: Regex::new(r"/zones/([^/]+)/").expect("static zone pattern"),
        project: Regex::new(r"/projects/([^/]+)/").expect("static project pattern"),
    })
}

impl ResourceName {
    /// Extract each identifier independently; a missing segment yields `None`
    pub fn parse(name: &str) -> Self {
        let capture = |re: &Regex| re.captures(name).map(|c| c[1].to_string());
        let patterns = patterns();

        Self {
            instance_id: capture(&patterns.instance),
            zone: capture(&patterns.zone),
            project_id: capture(&patterns.project),
        }
    }
}

/// Group normalized events and compute per-group statistics
///
/// Events keep their input order inside a group, which makes the SKU mode
/// tie-break (first encountered) deterministic.
pub fn aggregate(events: &[NormalizedEvent]) -> Vec<AggregateRecord> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(GroupKey, Vec<&NormalizedEvent>)> = Vec::new();

    for event in events {
        let key = (
            event.date,
            event.instance_id.clone(),
            event.project_id.clone(),
            event.zone.clone(),
        );
        match index.get(&key) {
            Some(&position) => groups[position].1.push(event),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![event]));
            }
        }
    }

    let mut records: Vec<AggregateRecord> = groups
        .into_iter()
        .map(|(key, rows)| aggregate_group(key, &rows))
        .collect();
    records.sort_by(compare_keys);
    records
}

fn aggregate_group(key: GroupKey, rows: &[&NormalizedEvent]) -> AggregateRecord {
    let column = |field: fn(&NormalizedEvent) -> Option<f64>| -> Vec<f64> {
        rows.iter().filter_map(|row| field(row)).collect()
    };

    let cpu = column(|r| r.cpu_utilization);
    let memory = column(|r| r.memory_used_gb);
    let disk_read = column(|r| r.disk_read_bytes);
    let disk_write = column(|r| r.disk_write_bytes);
    let ingress = column(|r| r.ingress_bytes);
    let egress = column(|r| r.egress_bytes);
    let network_total = column(|r| r.network_total_bytes);
    let disk_total = column(|r| r.disk_total_bytes);
    let uptime = column(|r| r.uptime_fraction);
    let cost = column(|r| r.cost_usd);
    let cost_per_cpu = column(|r| r.cost_per_cpu);

    let (date, instance_id, project_id, zone) = key;
    AggregateRecord {
        date,
        instance_id,
        project_id,
        zone,
        cpu_utilization_mean: stats::mean(&cpu),
        cpu_utilization_std: stats::sample_std(&cpu),
        cpu_utilization_min: stats::min(&cpu),
        cpu_utilization_max: stats::max(&cpu),
        memory_used_gb_mean: stats::mean(&memory),
        memory_used_gb_std: stats::sample_std(&memory),
        memory_used_gb_min: stats::min(&memory),
        memory_used_gb_max: stats::max(&memory),
        disk_read_bytes_sum: stats::sum(&disk_read),
        disk_read_bytes_mean: stats::mean(&disk_read),
        disk_write_bytes_sum: stats::sum(&disk_write),
        disk_write_bytes_mean: stats::mean(&disk_write),
        ingress_bytes_sum: stats::sum(&ingress),
        ingress_bytes_mean: stats::mean(&ingress),
        egress_bytes_sum: stats::sum(&egress),
        egress_bytes_mean: stats::mean(&egress),
        network_total_bytes_sum: stats::sum(&network_total),
        network_total_bytes_mean: stats::mean(&network_total),
        disk_total_bytes_sum: stats::sum(&disk_total),
        disk_total_bytes_mean: stats::mean(&disk_total),
        uptime_fraction_mean: stats::mean(&uptime),
        uptime_fraction_min: stats::min(&uptime),
        uptime_fraction_max: stats::max(&uptime),
        cost_usd_sum: stats::sum(&cost),
        cost_usd_mean: stats::mean(&cost),
        cost_usd_max: stats::max(&cost),
        cost_per_cpu_mean: stats::mean(&cost_per_cpu),
        sku_category: mode_category(rows),
    }
}

/// Most frequent category; ties go to the one seen first
fn mode_category(rows: &[&NormalizedEvent]) -> Option<SkuCategory> {
    let mut counts: Vec<(SkuCategory, usize)> = Vec::new();
    for category in rows.iter().filter_map(|r| r.sku_category) {
        match counts.iter_mut().find(|(c, _)| *c == category) {
            Some(entry) => entry.1 += 1,
            None => counts.push((category, 1)),
        }
    }

    let mut best: Option<(SkuCategory, usize)> = None;
    for (category, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((category, count));
        }
    }
    best.map(|(category, _)| category)
}

fn compare_keys(a: &AggregateRecord, b: &AggregateRecord) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| nulls_last(&a.instance_id, &b.instance_id))
        .then_with(|| nulls_last(&a.project_id, &b.project_id))
        .then_with(|| nulls_last(&a.zone, &b.zone))
}

fn nulls_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
