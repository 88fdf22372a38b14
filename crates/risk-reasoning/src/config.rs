//! Reasoning service configuration

use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,
    /// No key means every request is answered locally
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Upper bound on a whole reasoning round trip
    pub timeout: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(512),
            temperature: Some(0.4),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ReasoningConfig {
    /// Read configuration from environment variables.
    ///
    /// - `SAFEZONE_AI_API_KEY` - bearer token (optional; offline when unset)
    /// - `SAFEZONE_AI_URL` - API base URL (default: https://api.openai.com)
    /// - `SAFEZONE_AI_MODEL` - model name (default: gpt-4o-mini)
    /// - `SAFEZONE_AI_TIMEOUT_SECS` - request timeout (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = env::var("SAFEZONE_AI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let api_url = env::var("SAFEZONE_AI_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let model = env::var("SAFEZONE_AI_MODEL").unwrap_or(defaults.model);

        let timeout = env::var("SAFEZONE_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            api_url,
            api_key,
            model,
            timeout,
            ..defaults
        }
    }

    pub fn is_online(&self) -> bool {
        self.api_key.is_some()
    }
}
