//! Driver-facing explanation and advice templates

use crate::scorer::FactorKind;
use crate::{RiskFactor, RiskLevel};

/// Number of factors named in an explanation
const EXPLAINED_FACTORS: usize = 3;

/// Explanation text for a zone at the given level
///
/// `factors` must already be sorted by descending impact.
pub fn explanation(zone_name: &str, factors: &[RiskFactor], level: RiskLevel) -> String {
    let top: Vec<String> = factors
        .iter()
        .take(EXPLAINED_FACTORS)
        .map(|f| f.name.to_lowercase())
        .collect();

    match level {
        RiskLevel::Critical => format!(
            "CRITICAL: {} is extremely dangerous right now due to {}. Consider alternative routes.",
            zone_name,
            top.join(", ")
        ),
        RiskLevel::High => format!(
            "HIGH RISK: Approaching {}. Risk elevated due to {}.",
            zone_name,
            top.join(" and ")
        ),
        RiskLevel::Moderate => format!(
            "CAUTION: {} has moderate risk from {}.",
            zone_name,
            top.join(", ")
        ),
        RiskLevel::Low => format!("{} has minor risk factors: {}.", zone_name, top.join(", ")),
        RiskLevel::Safe => format!("{} is currently safe for normal driving.", zone_name),
    }
}

pub(crate) fn suggested_action(level: RiskLevel, kinds: &[FactorKind]) -> String {
    let slippery = kinds.iter().any(FactorKind::is_slippery);
    let poor_visibility = kinds.iter().any(FactorKind::limits_visibility);
    let curve = kinds.iter().any(FactorKind::is_curve);

    let action = match level {
        RiskLevel::Critical => {
            "Strongly recommend taking an alternative route. If you must proceed, reduce speed to 15 mph and use hazard lights."
        }
        RiskLevel::High if slippery => {
            "Reduce speed to 25 mph. Increase following distance. Brake gently."
        }
        RiskLevel::High if poor_visibility => {
            "Turn on headlights. Reduce speed to 25 mph. Stay alert for pedestrians."
        }
        RiskLevel::High if curve => "Reduce speed to 20 mph before entering curve. Stay in your lane.",
        RiskLevel::High => "Reduce speed significantly. Stay alert and be prepared to stop.",
        RiskLevel::Moderate => "Reduce speed to 30 mph. Stay alert and be prepared for hazards.",
        RiskLevel::Low => "Maintain safe speed. Be aware of surroundings.",
        RiskLevel::Safe => "Proceed normally. Maintain awareness of road conditions.",
    };

    action.to_string()
}
