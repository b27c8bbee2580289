//! Service configuration, loaded from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default GUVI scoring endpoint.
const DEFAULT_CALLBACK_URL: &str = "https://hackathon.guvi.in/api/updateHoneyPotFinalResult";

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: SecretString,
    /// Listen port.
    pub port: u16,
    /// Gemini API key.
    pub gemini_api_key: SecretString,
    /// Model identifier for all LLM calls.
    pub model_name: String,
    /// External scoring endpoint URL.
    pub callback_url: String,
    /// Redis URL; when set, sessions live in Redis instead of memory.
    pub redis_url: Option<String>,
    /// Idle duration after which a session is considered expired.
    pub session_timeout: Duration,
    /// Bound on every classifier/responder/extractor model call.
    pub llm_timeout: Duration,
    /// Bound on the callback POST.
    pub callback_timeout: Duration,
    /// Whether the extractor's LLM enrichment pass runs at all.
    pub extraction_enrichment: bool,
    /// Sampling temperature for persona replies.
    pub agent_temperature: f32,
    /// Domains never reported as phishing links.
    pub link_denylist: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `API_KEY` and `GEMINI_API_KEY` are required; everything else has a
    /// default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_env("API_KEY")?;
        let gemini_api_key = require_env("GEMINI_API_KEY")?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            port: parse_env("PORT", 8000)?,
            gemini_api_key: SecretString::from(gemini_api_key),
            model_name: std::env::var("MODEL_NAME")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            callback_url: std::env::var("CALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_CALLBACK_URL.to_string()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            session_timeout: Duration::from_secs(parse_env("SESSION_TIMEOUT_SECS", 3600)?),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 8)?),
            callback_timeout: Duration::from_secs(parse_env("CALLBACK_TIMEOUT_SECS", 10)?),
            extraction_enrichment: std::env::var("EXTRACTION_ENRICHMENT")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            agent_temperature: parse_env("AGENT_TEMPERATURE", 0.85f32)?,
            link_denylist: link_denylist_from_env(),
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated `LINK_DENYLIST`, falling back to well-known benign domains.
fn link_denylist_from_env() -> Vec<String> {
    match std::env::var("LINK_DENYLIST") {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec![
            "google.com".to_string(),
            "microsoft.com".to_string(),
            "apple.com".to_string(),
        ],
    }
}
