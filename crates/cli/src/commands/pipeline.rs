//! Local pipeline commands: preprocess, analyze and split

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use insight_lib::{
    analysis::analyze,
    ingest::read_events,
    preprocess::Preprocessor,
    snapshot::read_snapshot,
    split::{train_test_split, write_split, SplitStrategy},
    AggregateRecord, AnalysisReport,
};
use serde_json::json;
use tabled::Tabled;

use crate::output::{
    color_category, format_number, format_percent, format_usd, print_info, print_json,
    print_success, print_table, print_warning, OutputFormat,
};

/// Row for the aggregate table
#[derive(Tabled)]
struct AggregateRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory (GB)")]
    memory_gb: String,
    #[tabled(rename = "Uptime")]
    uptime: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "SKU")]
    sku: String,
}

impl From<&AggregateRecord> for AggregateRow {
    fn from(record: &AggregateRecord) -> Self {
        Self {
            date: record.date.to_string(),
            instance: record.instance_id.clone().unwrap_or_else(|| "-".to_string()),
            cpu: format_percent(record.cpu_utilization_mean),
            memory_gb: format_number(record.memory_used_gb_mean),
            uptime: format_percent(record.uptime_fraction_mean),
            cost: format_usd(record.cost_usd_sum),
            sku: record
                .sku_category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Row for the per-instance analysis table
#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Avg CPU")]
    cpu: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Uptime")]
    reliability: String,
    #[tabled(rename = "Total Cost")]
    total_cost: String,
    #[tabled(rename = "Daily Cost")]
    daily_cost: String,
    #[tabled(rename = "Anomalies")]
    anomalies: usize,
}

/// Aggregate a raw telemetry file, optionally persisting the snapshot
pub fn preprocess(input: &Path, snapshot: Option<&Path>, format: OutputFormat) -> Result<()> {
    let events = read_events(input).context("Failed to load VM telemetry")?;

    let mut preprocessor = Preprocessor::new();
    if let Some(path) = snapshot {
        preprocessor = preprocessor.with_snapshot(path);
    }
    let records = preprocessor.run(&events).context("Preprocessing failed")?;

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            let rows: Vec<AggregateRow> = records.iter().map(AggregateRow::from).collect();
            print_table(rows, "No aggregate records produced");
            println!(
                "\n{} events aggregated into {} records",
                events.len(),
                records.len()
            );
            if let Some(path) = snapshot {
                print_success(&format!("Snapshot written to {}", path.display()));
            }
        }
    }
    Ok(())
}

/// Analyze either a raw telemetry file or a previously written snapshot
pub fn analyze_command(
    input: Option<&Path>,
    snapshot: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let records = match (input, snapshot) {
        (Some(path), _) => {
            let events = read_events(path).context("Failed to load VM telemetry")?;
            Preprocessor::new()
                .run(&events)
                .context("Preprocessing failed")?
        }
        (None, Some(path)) => read_snapshot(path).context("Failed to load snapshot")?,
        (None, None) => anyhow::bail!("either --input or --snapshot is required"),
    };

    let report = analyze(&records).context("Analysis failed")?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => render_report(&report),
    }
    Ok(())
}

fn render_report(report: &AnalysisReport) {
    match &report.instance_summary {
        Some(summary) => print_info(&format!(
            "{} instances, {} to {} ({} days)",
            summary.total_instances,
            summary.date_range.start,
            summary.date_range.end,
            summary.date_range.total_days
        )),
        None => print_warning("No instance identifiers in the dataset"),
    }

    if let Some(overall) = report.cost_analysis.as_ref().and_then(|c| c.overall.as_ref()) {
        print_info(&format!(
            "Total cost {}, projected monthly {}",
            format_usd(Some(overall.total_cost)),
            format_usd(Some(overall.projected_monthly_cost))
        ));
    }
    if let Some(cpu) = &report.utilization_insights.overall.cpu {
        print_info(&format!(
            "Average CPU {} ({})",
            format_percent(Some(cpu.average_utilization)),
            color_category(cpu.utilization_category.as_str())
        ));
    }

    let rows: Vec<InstanceRow> = report
        .per_instance_analysis
        .keys()
        .map(|instance| {
            let utilization = report.utilization_insights.per_instance.get(instance);
            let cpu = utilization.and_then(|u| u.cpu.as_ref());
            let cost = report
                .cost_analysis
                .as_ref()
                .and_then(|c| c.per_instance.get(instance));
            let anomalies = report
                .anomalies
                .get(instance)
                .map(|metrics| metrics.values().map(|a| a.count).sum())
                .unwrap_or(0);

            InstanceRow {
                instance: instance.clone(),
                cpu: format_percent(cpu.map(|c| c.average)),
                category: cpu
                    .map(|c| color_category(c.category.as_str()))
                    .unwrap_or_else(|| "-".to_string()),
                reliability: utilization
                    .and_then(|u| u.uptime.as_ref())
                    .map(|u| u.reliability_rating.as_str().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                total_cost: format_usd(cost.map(|c| c.total_cost)),
                daily_cost: format_usd(cost.map(|c| c.avg_daily_cost)),
                anomalies,
            }
        })
        .collect();

    println!();
    print_table(rows, "No per-instance analysis available");

    let anomalies = report.anomaly_count();
    if anomalies > 0 {
        print_warning(&format!("{} anomalous observations detected", anomalies));
    }
}

fn date_span(records: &[AggregateRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let start = records.iter().map(|r| r.date).min()?;
    let end = records.iter().map(|r| r.date).max()?;
    Some((start, end))
}

fn describe_span(records: &[AggregateRecord]) -> String {
    match date_span(records) {
        Some((start, end)) => format!("{} to {}", start, end),
        None => "empty".to_string(),
    }
}

/// Partition a snapshot into train and test files
pub fn split(
    snapshot: &Path,
    test_size: f64,
    strategy: SplitStrategy,
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let records = read_snapshot(snapshot).context("Failed to load snapshot")?;
    let split = train_test_split(&records, test_size, strategy).context("Split failed")?;
    let (train_path, test_path) =
        write_split(&split, out_dir).context("Failed to write split files")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "train_path": train_path,
            "test_path": test_path,
            "train_records": split.train.len(),
            "test_records": split.test.len(),
        }))?,
        OutputFormat::Table => {
            print_success(&format!(
                "Train: {} records ({}) -> {}",
                split.train.len(),
                describe_span(&split.train),
                train_path.display()
            ));
            print_success(&format!(
                "Test: {} records ({}) -> {}",
                split.test.len(),
                describe_span(&split.test),
                test_path.display()
            ));
        }
    }
    Ok(())
}
