//! Spoken alert text
//!
//! Speech synthesis happens on the client; this only decides what is said
//! and how fast.

use crate::AiReasoning;
use alert_policy::Alert;
use risk_engine::RiskLevel;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceAnnouncement {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

fn urgency(level: RiskLevel) -> (&'static str, f32) {
    match level {
        RiskLevel::Critical => ("Critical warning!", 1.1),
        RiskLevel::High => ("High risk alert!", 1.05),
        RiskLevel::Moderate => ("Caution!", 1.0),
        _ => ("", 1.0),
    }
}

impl VoiceAnnouncement {
    pub fn for_alert(alert: &Alert, reasoning: &AiReasoning) -> Self {
        let (prefix, rate) = urgency(alert.risk_score.level);

        let mut action = format!("Recommended speed: {}.", reasoning.safe_speed);
        if let Some(first) = reasoning.recommendations.first() {
            action.push(' ');
            action.push_str(first);
        }

        let text = format!(
            "{} Approaching {}. Risk score: {}. {}. {}",
            prefix,
            alert.zone_name,
            alert.risk_score.score,
            reasoning.explanation.trim_end_matches('.'),
            action
        );

        Self {
            text: text.trim_start().to_string(),
            rate,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::error_fallback;
    use crate::test_support::alert;

    #[test]
    fn test_critical_announcement() {
        let alert = alert(85, RiskLevel::Critical);
        let v = VoiceAnnouncement::for_alert(&alert, &error_fallback(&alert.zone_name));
        assert_eq!(
            v.text,
            "Critical warning! Approaching Twin Peaks Blvd. Risk score: 85. \
             Caution: Twin Peaks Blvd ahead with elevated risk. \
             Recommended speed: 40 km/h. Reduce speed"
        );
        assert_eq!(v.rate, 1.1);
    }

    #[test]
    fn test_rate_by_level() {
        let reasoning = error_fallback("x");
        assert_eq!(VoiceAnnouncement::for_alert(&alert(65, RiskLevel::High), &reasoning).rate, 1.05);

        let moderate = VoiceAnnouncement::for_alert(&alert(45, RiskLevel::Moderate), &reasoning);
        assert_eq!(moderate.rate, 1.0);
        assert!(moderate.text.starts_with("Caution! Approaching"));

        let low = VoiceAnnouncement::for_alert(&alert(30, RiskLevel::Low), &reasoning);
        assert!(low.text.starts_with("Approaching Twin Peaks Blvd."));
    }

    #[test]
    fn test_no_recommendations() {
        let mut reasoning = error_fallback("x");
        reasoning.recommendations.clear();
        let v = VoiceAnnouncement::for_alert(&alert(65, RiskLevel::High), &reasoning);
        assert!(v.text.ends_with("Recommended speed: 40 km/h."));
    }
}
