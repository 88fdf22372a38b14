//! Risk Reasoning
//!
//! Turns an [`Alert`] into a short driver briefing (why the zone is
//! dangerous, what to do, a safe speed). The briefing comes from an
//! OpenAI-compatible chat model when one is configured; every failure path
//! (no key, rate limit, quota, network, timeout, malformed output) is
//! replaced by a deterministic local briefing so callers always get an
//! answer in bounded time.

use alert_policy::Alert;
use async_trait::async_trait;
use micro_zones::RoadFeature;
use risk_engine::{EnvironmentSnapshot, RiskFactor, RiskLevel};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod api_types;
pub mod config;
pub mod fallback;
pub mod provider;
pub mod voice;

pub use config::ReasoningConfig;
pub use fallback::{empty_response_fallback, error_fallback, service_fallback};
pub use provider::{build_provider, extract_json, ChatCompletionsProvider, OfflineProvider};
pub use voice::VoiceAnnouncement;

#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("SAFEZONE_AI_API_KEY is not configured")]
    NotConfigured,

    #[error("Rate limit exceeded. Please try again shortly.")]
    RateLimited,

    #[error("AI credits depleted. Using fallback reasoning.")]
    CreditsDepleted,

    #[error("AI gateway error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Reasoning timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, ReasoningError>;

/// Urgency attached to a briefing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Caution,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn from_risk_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Critical => AlertLevel::Danger,
            RiskLevel::High => AlertLevel::Warning,
            _ => AlertLevel::Caution,
        }
    }
}

/// Briefing shown and spoken to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReasoning {
    pub explanation: String,
    pub primary_risk: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub safe_speed: String,
    pub alert_level: AlertLevel,
}

/// Everything the model sees about an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskInput {
    pub zone_name: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub zone_features: Vec<String>,
    pub weather: String,
    pub traffic: String,
    pub time_of_day: String,
    /// Meters to the zone centre
    pub distance: u32,
    /// Driver speed (km/h)
    pub speed: u32,
}

impl RiskInput {
    /// `speed` is the raw position-source speed in m/s
    pub fn from_alert(
        alert: &Alert,
        speed: f64,
        environment: &EnvironmentSnapshot,
        features: &[RoadFeature],
    ) -> Self {
        let kmh = if speed.is_finite() { (speed.max(0.0) * 3.6).round() } else { 0.0 };
        Self {
            zone_name: alert.zone_name.clone(),
            risk_score: alert.risk_score.score,
            risk_level: alert.risk_score.level,
            factors: alert.risk_score.factors.clone(),
            zone_features: features.iter().map(|f| f.display_name().to_string()).collect(),
            weather: environment.weather.summary(),
            traffic: environment.traffic.summary(),
            time_of_day: time_of_day(environment.hour).to_string(),
            distance: alert.distance_m.max(0.0).round() as u32,
            speed: kmh as u32,
        }
    }
}

/// Coarse period of day used in prompts
pub fn time_of_day(hour: u8) -> &'static str {
    match hour {
        6..=11 => "morning",
        12..=17 => "afternoon",
        18..=21 => "evening",
        _ => "night",
    }
}

/// Source of language-model briefings
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the service answered but produced no briefing
    async fn generate(&self, input: &RiskInput) -> Result<Option<AiReasoning>>;
}

/// Briefing plus whether it was produced locally
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningOutcome {
    pub reasoning: AiReasoning,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ask `provider` for a briefing, never failing and never waiting past `limit`
pub async fn generate_or_fallback(
    provider: &dyn ReasoningProvider,
    alert: &Alert,
    input: &RiskInput,
    limit: Duration,
) -> ReasoningOutcome {
    let result = match tokio::time::timeout(limit, provider.generate(input)).await {
        Ok(result) => result,
        Err(_) => Err(ReasoningError::Timeout(limit)),
    };

    match result {
        Ok(Some(reasoning)) => {
            debug!("{} briefing for {}", provider.name(), alert.zone_name);
            ReasoningOutcome {
                reasoning,
                fallback: false,
                error: None,
            }
        }
        Ok(None) => {
            warn!("{} returned no briefing for {}", provider.name(), alert.zone_name);
            ReasoningOutcome {
                reasoning: empty_response_fallback(alert),
                fallback: true,
                error: None,
            }
        }
        Err(e) => {
            warn!("Reasoning failed for {}: {}", alert.zone_name, e);
            ReasoningOutcome {
                reasoning: error_fallback(&alert.zone_name),
                fallback: true,
                error: Some(e.to_string()),
            }
        }
    }
}
