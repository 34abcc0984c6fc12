//! Server configuration

use anyhow::{Context, Result};
use insight_lib::recommend::{DEFAULT_GEMINI_BASE_URL, DEFAULT_MODEL};
use serde::Deserialize;

/// Server configuration, read from `INSIGHT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Raw telemetry CSV loaded on every data request
    #[serde(default = "default_input_path")]
    pub input_path: String,

    /// Where `/vm/preprocessed` persists the aggregate table, if anywhere
    #[serde(default)]
    pub snapshot_path: Option<String>,

    #[serde(default = "default_google_api_key")]
    pub google_api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Analyst context document embedded in the prompt
    #[serde(default)]
    pub context_path: Option<String>,

    /// Timeout for a single model request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_input_path() -> String {
    "data/input/VM_instance_data.csv".to_string()
}

fn default_google_api_key() -> Option<String> {
    std::env::var("GOOGLE_AI_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            input_path: default_input_path(),
            snapshot_path: None,
            google_api_key: default_google_api_key(),
            model: default_model(),
            gemini_base_url: default_gemini_base_url(),
            context_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("INSIGHT"))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid INSIGHT_* configuration")
    }
}
