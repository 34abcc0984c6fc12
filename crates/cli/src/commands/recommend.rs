//! LLM recommendation command

use anyhow::Result;
use colored::Colorize;
use insight_lib::recommend::RecommendationResponse;

use crate::client::ApiClient;
use crate::output::{print_info, print_json, print_warning, OutputFormat};

/// Fetch recommendations from the server and render them
pub async fn recommend(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.recommendations().await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => render(&response),
    }
    Ok(())
}

fn render(response: &RecommendationResponse) {
    if let Some(error) = &response.error {
        print_warning(error);
    }
    if let Some(model) = &response.model_used {
        print_info(&format!("{} recommendations from {}", response.service, model));
    }

    print_section("Insights", &response.insights);
    print_section("Recommendations", &response.recommendations);
}

fn print_section(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}", title.bold());
    for (index, item) in items.iter().enumerate() {
        println!("  {}. {}", index + 1, item);
    }
}
