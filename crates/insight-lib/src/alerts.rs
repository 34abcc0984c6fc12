//! Operational alerts shown alongside the analysis
//!
//! Alerts are served from a bundled fixture until a live alert source
//! exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MOCK_ALERTS: &str = include_str!("../data/mock_alerts.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactLevel::High => write!(f, "High"),
            ImpactLevel::Medium => write!(f, "Medium"),
            ImpactLevel::Low => write!(f, "Low"),
        }
    }
}

impl FromStr for ImpactLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(ImpactLevel::High),
            "medium" => Ok(ImpactLevel::Medium),
            "low" => Ok(ImpactLevel::Low),
            other => Err(Error::data(
                "impact_level",
                format!("expected high, medium or low, got '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub vm_instance: String,
    pub impact_level: ImpactLevel,
    pub category: String,
    pub detailed_explanation: String,
}

impl Alert {
    /// First paragraph of the explanation, cut to `max_chars` characters
    pub fn preview(&self, max_chars: usize) -> String {
        let first = self
            .detailed_explanation
            .split("\n\n")
            .next()
            .unwrap_or_default()
            .trim();
        if first.chars().count() <= max_chars {
            return first.to_string();
        }
        let cut: String = first.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut.trim_end())
    }
}

/// The bundled alert fixture
pub fn mock_alerts() -> Result<Vec<Alert>> {
    Ok(serde_json::from_str(MOCK_ALERTS)?)
}

/// Keep alerts of one impact level; `None` keeps everything
pub fn filter_by_impact(alerts: Vec<Alert>, impact: Option<ImpactLevel>) -> Vec<Alert> {
    match impact {
        Some(level) => alerts
            .into_iter()
            .filter(|alert| alert.impact_level == level)
            .collect(),
        None => alerts,
    }
}
