//! API client for communicating with the insight server

use anyhow::{Context, Result};
use insight_lib::{
    alerts::{Alert, ImpactLevel},
    recommend::RecommendationResponse,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
}

impl ClientError {
    /// True when `error` means no server answered at all
    pub fn is_unreachable(error: &anyhow::Error) -> bool {
        matches!(
            error.downcast_ref::<ClientError>(),
            Some(ClientError::Unreachable(_))
        )
    }
}

/// API client for the insight server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ClientError::Unreachable(e).into()
                } else {
                    anyhow::Error::new(e).context("Failed to send request")
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body }.into());
        }

        response.json().await.context("Failed to parse response")
    }

    /// Fetch LLM recommendations for the server's dataset
    pub async fn recommendations(&self) -> Result<RecommendationResponse> {
        self.get("vm/recommendations").await
    }

    /// Fetch operational alerts, optionally filtered by impact
    pub async fn alerts(&self, impact: Option<ImpactLevel>) -> Result<Vec<Alert>> {
        let path = match impact {
            Some(level) => format!("alerts?impact={}", level.to_string().to_lowercase()),
            None => "alerts".to_string(),
        };
        self.get(&path).await
    }
}
