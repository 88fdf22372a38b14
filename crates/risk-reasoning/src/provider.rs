//! Reasoning providers

use crate::api_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::config::ReasoningConfig;
use crate::fallback::service_fallback;
use crate::{AiReasoning, ReasoningError, ReasoningProvider, Result, RiskInput};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SYSTEM_PROMPT: &str = r#"You are SafeZone AI, a road safety assistant that provides clear, concise, and actionable safety warnings to drivers. Your role is to:

1. Explain WHY a road zone is dangerous in simple, urgent terms
2. Provide personalized safety recommendations based on current conditions
3. Keep responses brief but impactful - drivers need quick, scannable information
4. Use a calm but authoritative tone that conveys urgency without causing panic

Format your response as JSON with these exact fields:
{
  "explanation": "A 1-2 sentence explanation of why this zone is dangerous right now",
  "primaryRisk": "The single most critical risk factor",
  "recommendations": ["Array of 2-3 specific actionable recommendations"],
  "safeSpeed": "Recommended safe speed for this zone",
  "alertLevel": "The urgency level: CAUTION, WARNING, or DANGER"
}"#;

pub fn user_prompt(input: &RiskInput) -> String {
    let breakdown: Vec<String> = input
        .factors
        .iter()
        .map(|f| format!("- {}: +{}", f.name, f.impact))
        .collect();

    format!(
        "Analyze this road zone and provide safety guidance:\n\n\
         Zone: {}\n\
         Risk Score: {}/100 ({})\n\
         Distance: {}m ahead\n\
         Current Speed: {} km/h\n\n\
         Zone Features: {}\n\
         Weather: {}\n\
         Traffic: {}\n\
         Time: {}\n\n\
         Risk Breakdown:\n{}\n\n\
         Provide a safety analysis and recommendations.",
        input.zone_name,
        input.risk_score,
        input.risk_level,
        input.distance,
        input.speed,
        input.zone_features.join(", "),
        input.weather,
        input.traffic,
        input.time_of_day,
        breakdown.join("\n"),
    )
}

/// Outermost `{...}` span of a model reply, which may be wrapped in prose or
/// a fenced code block
pub fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parse a model reply, substituting the service fallback when it is not a
/// usable briefing
pub fn parse_reasoning(content: &str, input: &RiskInput) -> AiReasoning {
    let parsed = extract_json(content)
        .ok_or_else(|| "No JSON found in response".to_string())
        .and_then(|json| serde_json::from_str::<AiReasoning>(json).map_err(|e| e.to_string()));

    match parsed {
        Ok(reasoning) => reasoning,
        Err(e) => {
            error!("Failed to parse AI response: {}", e);
            service_fallback(input)
        }
    }
}

/// Map a non-success upstream status to an error
pub fn status_error(status: StatusCode, body: &str) -> ReasoningError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ReasoningError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => ReasoningError::CreditsDepleted,
        _ => {
            let message = serde_json::from_str::<ApiError>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.to_string());
            ReasoningError::Upstream {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Briefings from an OpenAI-compatible `/v1/chat/completions` endpoint
pub struct ChatCompletionsProvider {
    client: Client,
    config: ReasoningConfig,
    api_key: String,
}

impl ChatCompletionsProvider {
    pub fn new(config: ReasoningConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or(ReasoningError::NotConfigured)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReasoningError::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Reasoning provider initialized with model: {} at {}",
            config.model, config.api_url
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<ChatCompletionResponse> {
        let url = format!("{}/v1/chat/completions", self.config.api_url);
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReasoningError::Network(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("AI gateway error: {} {}", status.as_u16(), body);
            return Err(status_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ReasoningError::Network(format!("Failed to read response: {}", e)))
    }
}

#[async_trait]
impl ReasoningProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn generate(&self, input: &RiskInput) -> Result<Option<AiReasoning>> {
        info!("Generating risk reasoning for: {}", input.zone_name);

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt(input))];
        let completion = self.chat_completion(messages).await?;

        let Some(content) = completion.first_content() else {
            warn!("AI response had no content");
            return Ok(None);
        };

        debug!(
            "AI response received: {}",
            content.chars().take(100).collect::<String>()
        );

        Ok(Some(parse_reasoning(content, input)))
    }
}

/// Stands in when no API key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

#[async_trait]
impl ReasoningProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _input: &RiskInput) -> Result<Option<AiReasoning>> {
        Err(ReasoningError::NotConfigured)
    }
}

/// Remote provider when a key is configured, offline otherwise
pub fn build_provider(config: &ReasoningConfig) -> Arc<dyn ReasoningProvider> {
    if !config.is_online() {
        info!("No reasoning API key configured; using local briefings");
        return Arc::new(OfflineProvider);
    }

    match ChatCompletionsProvider::new(config.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            warn!("Reasoning provider unavailable ({}); using local briefings", e);
            Arc::new(OfflineProvider)
        }
    }
}
