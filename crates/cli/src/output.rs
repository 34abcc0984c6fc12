//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use insight_lib::alerts::ImpactLevel;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table, or a warning when there are none
pub fn print_table<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        print_warning(empty_message);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Pretty-print any serializable value
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional fraction as a percentage
pub fn format_percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(value) => format!("{:.1}%", value * 100.0),
        None => "-".to_string(),
    }
}

/// Format an optional value with two decimals
pub fn format_number(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

/// Format a USD amount
pub fn format_usd(amount: Option<f64>) -> String {
    match amount {
        Some(value) => format!("${:.2}", value),
        None => "-".to_string(),
    }
}

/// Color a CPU utilization category
pub fn color_category(category: &str) -> String {
    match category {
        "over-utilized" => category.red().to_string(),
        "well-utilized" => category.green().to_string(),
        "under-utilized" => category.yellow().to_string(),
        _ => category.to_string(),
    }
}

/// Color an alert impact level
pub fn color_impact(level: ImpactLevel) -> String {
    let label = level.to_string();
    match level {
        ImpactLevel::High => label.red().bold().to_string(),
        ImpactLevel::Medium => label.yellow().to_string(),
        ImpactLevel::Low => label.blue().to_string(),
    }
}
