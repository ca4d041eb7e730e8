//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Service configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path to the local database file.
    pub db_path: String,
    /// LLM backend configuration.
    pub llm: LlmConfig,
    /// Deadline for one classification call.
    pub classify_timeout: Duration,
    /// How often the overdue sweep runs.
    pub sweep_interval: Duration,
}

impl Config {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_raw =
            std::env::var("GUEST_ASSIST_LLM_BACKEND").unwrap_or_else(|_| "anthropic".to_string());
        let backend =
            LlmBackend::parse(&backend_raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "GUEST_ASSIST_LLM_BACKEND".into(),
                message: format!("unknown backend '{backend_raw}'"),
            })?;

        let key_var = api_key_var(backend);
        let api_key = std::env::var(key_var)
            .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = std::env::var("GUEST_ASSIST_MODEL")
            .unwrap_or_else(|_| default_model(backend).to_string());

        let port: u16 = std::env::var("GUEST_ASSIST_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let db_path = std::env::var("GUEST_ASSIST_DB_PATH")
            .unwrap_or_else(|_| "./data/guest-assist.db".to_string());

        let classify_timeout_secs: u64 = std::env::var("GUEST_ASSIST_CLASSIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let sweep_interval_secs: u64 = std::env::var("GUEST_ASSIST_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            bind_addr: format!("0.0.0.0:{port}"),
            db_path,
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
            classify_timeout: Duration::from_secs(classify_timeout_secs),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

/// Which environment variable carries the API key for a backend.
pub fn api_key_var(backend: LlmBackend) -> &'static str {
    match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    }
}

/// Default model per backend when `GUEST_ASSIST_MODEL` is unset.
pub fn default_model(backend: LlmBackend) -> &'static str {
    match backend {
        LlmBackend::Anthropic => "claude-sonnet-4-20250514",
        LlmBackend::OpenAi => "gpt-4o",
    }
}
