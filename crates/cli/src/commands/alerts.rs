//! Operational alerts command

use anyhow::Result;
use insight_lib::alerts::{filter_by_impact, mock_alerts, Alert, ImpactLevel};
use tabled::Tabled;

use crate::client::{ApiClient, ClientError};
use crate::output::{color_impact, print_json, print_table, print_warning, OutputFormat};

const PREVIEW_CHARS: usize = 80;

/// Row for alerts table
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        Self {
            impact: color_impact(alert.impact_level),
            instance: alert.vm_instance.clone(),
            category: alert.category.clone(),
            title: alert.title.clone(),
            details: alert.preview(PREVIEW_CHARS),
        }
    }
}

/// Fetch alerts from the server, falling back to the bundled set when it is down
pub async fn alerts(
    client: &ApiClient,
    impact: Option<ImpactLevel>,
    format: OutputFormat,
) -> Result<()> {
    let alerts = match client.alerts(impact).await {
        Ok(alerts) => alerts,
        Err(e) if ClientError::is_unreachable(&e) => {
            tracing::debug!(error = %e, "Falling back to bundled alerts");
            print_warning("Server unreachable, showing bundled sample alerts");
            filter_by_impact(mock_alerts()?, impact)
        }
        Err(e) => return Err(e),
    };

    match format {
        OutputFormat::Json => print_json(&alerts)?,
        OutputFormat::Table => {
            let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
            print_table(rows, "No alerts found");
        }
    }
    Ok(())
}
