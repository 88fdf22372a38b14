//! Deterministic local briefings

use crate::{AiReasoning, AlertLevel, RiskInput};
use alert_policy::Alert;

/// Used when the model answered with something that is not a briefing
pub fn service_fallback(input: &RiskInput) -> AiReasoning {
    let lead = input
        .zone_features
        .first()
        .map(String::as_str);

    let safe_speed = if input.risk_score > 70 {
        "30 km/h"
    } else if input.risk_score > 50 {
        "40 km/h"
    } else {
        "50 km/h"
    };

    AiReasoning {
        explanation: format!(
            "Approaching {} with {} risk due to {}.",
            input.zone_name,
            input.risk_level,
            lead.unwrap_or("road conditions")
        ),
        primary_risk: lead.unwrap_or("Variable road conditions").to_string(),
        recommendations: vec![
            "Reduce speed before entering zone".to_string(),
            "Stay alert and maintain safe following distance".to_string(),
            "Be prepared to brake if needed".to_string(),
        ],
        safe_speed: safe_speed.to_string(),
        alert_level: AlertLevel::from_risk_level(input.risk_level),
    }
}

/// Used when the service replied without any briefing
pub fn empty_response_fallback(alert: &Alert) -> AiReasoning {
    let score = &alert.risk_score;
    AiReasoning {
        explanation: format!(
            "Approaching {} zone with {} risk level.",
            alert.zone_name, score.level
        ),
        primary_risk: score.explanation.clone(),
        recommendations: vec![
            "Reduce speed before entering zone".to_string(),
            "Stay alert and focused".to_string(),
            "Maintain safe following distance".to_string(),
        ],
        safe_speed: if score.score > 70 { "30 km/h" } else { "40 km/h" }.to_string(),
        alert_level: AlertLevel::from_risk_level(score.level),
    }
}

/// Used when the request itself failed
pub fn error_fallback(zone_name: &str) -> AiReasoning {
    AiReasoning {
        explanation: format!("Caution: {} ahead with elevated risk.", zone_name),
        primary_risk: "Variable conditions".to_string(),
        recommendations: vec!["Reduce speed".to_string(), "Stay alert".to_string()],
        safe_speed: "40 km/h".to_string(),
        alert_level: AlertLevel::Caution,
    }
}
