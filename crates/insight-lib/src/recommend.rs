//! LLM-backed optimization recommendations
//!
//! The analysis report is condensed into a bounded text summary, embedded
//! in a fixed analyst prompt together with an optional context document,
//! and sent to a [`TextGenerator`]. The model is asked for JSON with
//! `insights` and `recommendations` string lists.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::{analyze_events, AnalysisReport, CpuCategory};
use crate::models::RawEvent;
use crate::observability::{PipelineMetrics, StructuredLogger};

pub const SERVICE_NAME: &str = "Compute Engine";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CONTEXT: &str = "No additional context available.";
/// Upper bound on the summary embedded in the prompt
pub const MAX_SUMMARY_CHARS: usize = 4000;

const FALLBACK_INSIGHT: &str = "Analysis completed but response format was unexpected";
const FALLBACK_RECOMMENDATION: &str = "Please review the raw analysis output";

/// Condensed, prompt-sized view of an analysis report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSummary(String);

impl DataSummary {
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut lines: Vec<String> = Vec::new();

        let instances = report
            .instance_summary
            .as_ref()
            .map(|s| s.total_instances)
            .unwrap_or(0);
        lines.push(format!("Total VM Instances: {}", instances));

        if let Some(cpu) = report.overall_stats.get("cpu_utilization_mean") {
            lines.push(String::new());
            lines.push("CPU Utilization:".to_string());
            lines.push(format!("  - Average: {:.2}%", cpu.mean * 100.0));
            lines.push(format!(
                "  - Range: {:.2}% - {:.2}%",
                cpu.min * 100.0,
                cpu.max * 100.0
            ));
        }

        if let Some(memory) = report.overall_stats.get("memory_used_gb_mean") {
            lines.push(String::new());
            lines.push("Memory Usage:".to_string());
            lines.push(format!("  - Average: {:.2} GB", memory.mean));
            lines.push(format!("  - Range: {:.2} - {:.2} GB", memory.min, memory.max));
        }

        if let Some(overall) = report.cost_analysis.as_ref().and_then(|c| c.overall.as_ref()) {
            lines.push(String::new());
            lines.push("Cost:".to_string());
            lines.push(format!("  - Total: ${:.2}", overall.total_cost));
            lines.push(format!(
                "  - Average per VM per day: ${:.2}",
                overall.average_daily_cost_per_instance
            ));
            lines.push(format!(
                "  - Projected monthly: ${:.2}",
                overall.projected_monthly_cost
            ));
        }

        let mut categories: BTreeMap<&'static str, usize> = BTreeMap::new();
        for cpu in report
            .utilization_insights
            .per_instance
            .values()
            .filter_map(|u| u.cpu.as_ref())
        {
            *categories.entry(cpu.category.as_str()).or_default() += 1;
        }
        if !categories.is_empty() {
            let count = |c: CpuCategory| categories.get(c.as_str()).copied().unwrap_or(0);
            lines.push(String::new());
            lines.push("Resource Utilization:".to_string());
            lines.push(format!("  - Underutilized VMs: {}", count(CpuCategory::UnderUtilized)));
            lines.push(format!("  - Overutilized VMs: {}", count(CpuCategory::OverUtilized)));
            lines.push(format!("  - Well-utilized VMs: {}", count(CpuCategory::WellUtilized)));
        }

        let anomalies = report.anomaly_count();
        if anomalies > 0 {
            let kinds: BTreeSet<&str> = report
                .anomalies
                .values()
                .flat_map(|metrics| metrics.keys().map(String::as_str))
                .collect();
            lines.push(String::new());
            lines.push(format!("Anomalies Detected: {}", anomalies));
            lines.push(format!(
                "  Types: {}",
                kinds.into_iter().collect::<Vec<_>>().join(", ")
            ));
        }

        if let Some(costs) = report.cost_analysis.as_ref() {
            let mut ranked: Vec<(&String, f64)> = costs
                .per_instance
                .iter()
                .map(|(instance, cost)| (instance, cost.total_cost))
                .collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            if !ranked.is_empty() {
                lines.push(String::new());
                lines.push("Top 3 Costly VMs:".to_string());
                for (instance, total) in ranked.into_iter().take(3) {
                    lines.push(format!("  - {}: ${:.2}", instance, total));
                }
            }
        }

        let text = lines.join("\n");
        let text = text.trim_end();
        let bounded = match text.char_indices().nth(MAX_SUMMARY_CHARS) {
            Some((cut, _)) => &text[..cut],
            None => text,
        };
        Self(bounded.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Read the analyst context document, falling back to [`DEFAULT_CONTEXT`]
pub fn load_context(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_CONTEXT.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(context) => context,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load analyst context");
            DEFAULT_CONTEXT.to_string()
        }
    }
}

pub fn build_prompt(summary: &DataSummary, context: &str) -> String {
    format!(
        r#"You are an expert cloud infrastructure analyst specializing in Google Cloud Platform VM optimization.

Use the following context and best practices to guide your analysis:

{context}

---

Now analyze the following VM instance data and provide actionable insights and recommendations:

{summary}

Based on the context provided and the data above, please provide:
1. Key Insights: 3-5 important observations about the current VM usage patterns
2. Recommendations: 3-5 specific, actionable recommendations to optimize cost, performance, or reliability

Make sure to reference specific metrics from the data and apply the best practices from the context.

Format your response as JSON with this structure:
{{
    "insights": ["insight 1", "insight 2", ...],
    "recommendations": ["recommendation 1", "recommendation 2", ...]
}}
"#,
        context = context,
        summary = summary.as_str(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl Recommendations {
    fn fallback() -> Self {
        Self {
            insights: vec![FALLBACK_INSIGHT.to_string()],
            recommendations: vec![FALLBACK_RECOMMENDATION.to_string()],
        }
    }
}

/// Parse the model's reply, tolerating a Markdown code fence around the JSON
pub fn parse_model_response(text: &str) -> Recommendations {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    match serde_json::from_str(cleaned.trim()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Model response is not the expected JSON");
            Recommendations::fallback()
        }
    }
}

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            anyhow::bail!("Gemini returned no candidates");
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecommendationResponse {
    fn missing_key() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            model_used: None,
            insights: Vec::new(),
            recommendations: Vec::new(),
            error: Some("Google AI API key not configured".to_string()),
        }
    }

    fn failed(error: &anyhow::Error) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            model_used: None,
            insights: vec!["Error occurred during analysis".to_string()],
            recommendations: vec!["Please check API key and try again".to_string()],
            error: Some(format!("Failed to generate recommendations: {:#}", error)),
        }
    }
}

/// Runs analysis and asks the generator for recommendations
///
/// Failures are reported inside the response rather than returned.
#[derive(Clone)]
pub struct Recommender {
    generator: Option<Arc<dyn TextGenerator>>,
    context: String,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl Recommender {
    /// `generator` is `None` when no API key is configured
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, context: impl Into<String>) -> Self {
        Self {
            generator,
            context: context.into(),
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("recommender"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn recommend(&self, events: Vec<RawEvent>) -> RecommendationResponse {
        if self.generator.is_none() {
            return RecommendationResponse::missing_key();
        }

        let report = tokio::task::spawn_blocking(move || analyze_events(&events))
            .await
            .context("Analysis task panicked")
            .and_then(|result| result.context("Analysis failed"));
        match report {
            Ok(report) => self.recommend_report(&report).await,
            Err(e) => {
                self.metrics.inc_recommendation_errors();
                self.logger.log_recommendation_failed("-", &format!("{:#}", e));
                RecommendationResponse::failed(&e)
            }
        }
    }

    pub async fn recommend_report(&self, report: &AnalysisReport) -> RecommendationResponse {
        let Some(generator) = self.generator.as_ref() else {
            return RecommendationResponse::missing_key();
        };

        let prompt = build_prompt(&DataSummary::from_report(report), &self.context);
        let start = Instant::now();
        let reply = generator.generate(&prompt).await;
        self.metrics
            .observe_recommendation_latency(start.elapsed().as_secs_f64());

        match reply {
            Ok(text) => {
                let parsed = parse_model_response(&text);
                self.logger.log_recommendation(
                    generator.model(),
                    parsed.insights.len(),
                    parsed.recommendations.len(),
                );
                RecommendationResponse {
                    service: SERVICE_NAME.to_string(),
                    model_used: Some(generator.model().to_string()),
                    insights: parsed.insights,
                    recommendations: parsed.recommendations,
                    error: None,
                }
            }
            Err(e) => {
                self.metrics.inc_recommendation_errors();
                self.logger
                    .log_recommendation_failed(generator.model(), &format!("{:#}", e));
                RecommendationResponse::failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_events;
    use crate::preprocess::BYTES_PER_GB;

    fn events() -> Vec<RawEvent> {
        let mut events = Vec::new();
        for (instance, cpu, cost) in [("101", 0.1, 1.0), ("202", 0.9, 9.0), ("303", 0.6, 4.0)] {
            for day in 1..=2 {
                events.push(RawEvent {
                    timestamp: format!("0{}-04-2024 06:00", day),
                    resource_global_name: Some(format!(
                        "//compute.googleapis.com/projects/demo/zones/us-east1-b/instances/{}",
                        instance
                    )),
                    cpu_utilization: Some(cpu),
                    memory_used_bytes: Some(2.0 * BYTES_PER_GB),
                    disk_read_bytes: None,
                    disk_write_bytes: None,
                    ingress_bytes: None,
                    egress_bytes: None,
                    uptime_fraction: Some(1.0),
                    cost_usd: Some(cost),
                    sku_description: None,
                });
            }
        }
        events
    }

    struct Canned(String);

    #[async_trait]
    impl TextGenerator for Canned {
        fn model(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        fn model(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    #[test]
    fn test_summary_counts_distinct_instances() {
        let report = analyze_events(&events()).unwrap();
        let summary = DataSummary::from_report(&report);
        let text = summary.as_str();

        assert!(text.starts_with("Total VM Instances: 3"));
        assert!(text.contains("Underutilized VMs: 1"));
        assert!(text.contains("Overutilized VMs: 1"));
        assert!(text.contains("Well-utilized VMs: 1"));
        assert!(text.contains("Total: $28.00"));

        let top = text.split("Top 3 Costly VMs:").nth(1).unwrap();
        assert!(top.trim_start().starts_with("- 202: $18.00"));
    }

    #[test]
    fn test_summary_sections_are_blank_line_separated() {
        let report = analyze_events(&events()).unwrap();
        let summary = DataSummary::from_report(&report);
        let text = summary.as_str();

        assert!(text.contains("Total VM Instances: 3\n\nCPU Utilization:\n  - Average: "));
        assert!(text.contains("\n\nMemory Usage:\n"));
        assert!(text.contains("\n\nCost:\n  - Total: $28.00\n"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_summary_is_bounded() {
        let report = analyze_events(&events()).unwrap();
        let summary = DataSummary::from_report(&report);
        assert!(summary.as_str().chars().count() <= MAX_SUMMARY_CHARS);
    }

    #[test]
    fn test_prompt_embeds_summary_and_context() {
        let report = analyze_events(&events()).unwrap();
        let summary = DataSummary::from_report(&report);
        let prompt = build_prompt(&summary, "Prefer E2 machine types.");

        assert!(prompt.contains("Prefer E2 machine types."));
        assert!(prompt.contains("Total VM Instances: 3"));
        assert!(prompt.contains("\"insights\": [\"insight 1\""));
    }

    #[test]
    fn test_load_context_fallback() {
        assert_eq!(load_context(None), DEFAULT_CONTEXT);
        assert_eq!(
            load_context(Some(Path::new("/nonexistent/context.md"))),
            DEFAULT_CONTEXT
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.md");
        std::fs::write(&path, "Right-size idle VMs.").unwrap();
        assert_eq!(load_context(Some(&path)), "Right-size idle VMs.");
    }

    #[test]
    fn test_parse_fenced_response() {
        let text = "```json\n{\"insights\": [\"a\"], \"recommendations\": [\"b\", \"c\"]}\n```";
        let parsed = parse_model_response(text);
        assert_eq!(parsed.insights, vec!["a"]);
        assert_eq!(parsed.recommendations, vec!["b", "c"]);
    }

    #[test]
    fn test_parse_missing_keys_default_to_empty() {
        let parsed = parse_model_response("{\"insights\": [\"only\"]}");
        assert_eq!(parsed.insights, vec!["only"]);
        assert!(parsed.recommendations.is_empty());
    }

    #[test]
    fn test_parse_garbage_gives_placeholders() {
        let parsed = parse_model_response("Sure! Here are my thoughts...");
        assert_eq!(parsed.insights, vec![FALLBACK_INSIGHT]);
        assert_eq!(parsed.recommendations, vec![FALLBACK_RECOMMENDATION]);
    }

    #[tokio::test]
    async fn test_missing_key_response() {
        let recommender = Recommender::new(None, DEFAULT_CONTEXT);
        let response = recommender.recommend(events()).await;

        assert_eq!(response.service, "Compute Engine");
        assert!(response.error.is_some());
        assert!(response.insights.is_empty());
        assert!(!recommender.is_configured());
    }

    #[tokio::test]
    async fn test_recommend_with_generator() {
        let generator = Canned("{\"insights\": [\"i\"], \"recommendations\": [\"r\"]}".to_string());
        let recommender = Recommender::new(Some(Arc::new(generator)), DEFAULT_CONTEXT);
        let response = recommender.recommend(events()).await;

        assert_eq!(response.model_used.as_deref(), Some("canned"));
        assert_eq!(response.insights, vec!["i"]);
        assert_eq!(response.recommendations, vec!["r"]);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_generator_failure_is_reported() {
        let recommender = Recommender::new(Some(Arc::new(Failing)), DEFAULT_CONTEXT);
        let response = recommender.recommend(events()).await;

        let error = response.error.unwrap();
        assert!(error.contains("quota exceeded"));
        assert_eq!(response.insights, vec!["Error occurred during analysis"]);
    }

    #[tokio::test]
    async fn test_analysis_failure_is_reported() {
        let mut bad = events();
        bad[0].timestamp = "2024/04/01".to_string();
        let recommender = Recommender::new(Some(Arc::new(Failing)), DEFAULT_CONTEXT);
        let response = recommender.recommend(bad).await;

        assert!(response.error.unwrap().contains("Analysis failed"));
    }

    #[tokio::test]
    async fn test_gemini_client_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"{\"insights\":[],"},{"text":"\"recommendations\":[]}"}]}}]}"#,
            )
            .create_async()
            .await;

        let client = GeminiClient::new(
            "test-key",
            DEFAULT_MODEL,
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap();
        let text = client.generate("hello").await.unwrap();

        assert_eq!(text, "{\"insights\":[],\"recommendations\":[]}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_gemini_client_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.5-flash:generateContent")
            .with_status(403)
            .with_body("API key not valid")
            .create_async()
            .await;

        let client =
            GeminiClient::new("bad", DEFAULT_MODEL, server.url(), Duration::from_secs(5)).unwrap();
        let error = client.generate("hello").await.unwrap_err();
        assert!(error.to_string().contains("403"));
    }
}
