//! Risk scoring implementation
//!
//! Additive model over the zone's base score. Every modifier is independent;
//! the sum is clamped to [0, 100] once at the end.

use crate::narrative::{explanation, suggested_action};
use crate::{
    is_night, is_rush_hour, MicroZone, RiskFactor, RiskLevel, RiskScore, RoadFeature, RoadSurface,
    SkyCondition, TrafficDensity, TrafficLevel, WeatherCondition, MAX_FACTORS,
};
use tracing::debug;

/// Night impact for zones tagged `poor_lighting`
pub const NIGHT_POOR_LIGHTING_IMPACT: u8 = 25;
/// Night impact for every other zone
pub const NIGHT_IMPACT: u8 = 15;
pub const RUSH_HOUR_IMPACT: u8 = 12;
pub const HIGH_TRAFFIC_IMPACT: u8 = 10;
pub const CONGESTED_TRAFFIC_IMPACT: u8 = 20;

/// What produced a factor, kept alongside it while the advice is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorKind {
    Night,
    RushHour,
    Weather(SkyCondition),
    Surface(RoadSurface),
    Traffic,
    Feature(RoadFeature),
}

impl FactorKind {
    pub(crate) fn limits_visibility(&self) -> bool {
        matches!(
            self,
            Self::Night | Self::Weather(SkyCondition::Fog) | Self::Feature(RoadFeature::PoorLighting)
        )
    }

    pub(crate) fn is_slippery(&self) -> bool {
        matches!(
            self,
            Self::Surface(RoadSurface::Wet)
                | Self::Surface(RoadSurface::Icy)
                | Self::Weather(SkyCondition::Rain)
        )
    }

    pub(crate) fn is_curve(&self) -> bool {
        matches!(self, Self::Feature(RoadFeature::SharpCurve))
    }
}

/// Impact of a sky condition; `None` for clear skies
pub fn weather_impact(condition: SkyCondition) -> Option<u8> {
    match condition {
        SkyCondition::Clear => None,
        SkyCondition::Rain => Some(20),
        SkyCondition::Fog => Some(30),
        SkyCondition::Snow => Some(35),
        SkyCondition::Storm => Some(40),
    }
}

/// Impact of a road surface; `None` for dry roads
pub fn surface_impact(surface: RoadSurface) -> Option<u8> {
    match surface {
        RoadSurface::Dry => None,
        RoadSurface::Wet => Some(15),
        RoadSurface::Icy => Some(40),
        RoadSurface::Flooded => Some(50),
    }
}

/// Impact of traffic density; `None` below high
pub fn traffic_impact(level: TrafficLevel) -> Option<u8> {
    match level {
        TrafficLevel::Low | TrafficLevel::Moderate => None,
        TrafficLevel::High => Some(HIGH_TRAFFIC_IMPACT),
        TrafficLevel::Congested => Some(CONGESTED_TRAFFIC_IMPACT),
    }
}

/// Fixed per-tag impact reported for road features
pub fn feature_impact(feature: RoadFeature) -> u8 {
    match feature {
        RoadFeature::SharpCurve => 20,
        RoadFeature::BlindIntersection => 25,
        RoadFeature::PoorLighting => 15,
        RoadFeature::SteepSlope => 18,
        RoadFeature::NarrowRoad => 12,
        RoadFeature::HighTraffic => 15,
        RoadFeature::SchoolZone => 22,
        RoadFeature::PedestrianCrossing => 18,
        RoadFeature::Construction => 20,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn factor(name: impl Into<String>, impact: u8, description: impl Into<String>) -> RiskFactor {
    RiskFactor {
        name: name.into(),
        impact,
        description: description.into(),
    }
}

/// Score a zone under the given conditions
pub fn calculate_risk_score(
    zone: &MicroZone,
    weather: &WeatherCondition,
    traffic: &TrafficDensity,
    hour: u8,
) -> RiskScore {
    let mut factors: Vec<(FactorKind, RiskFactor)> = Vec::new();
    let mut total = i32::from(zone.base_risk_score);

    if is_night(hour) {
        let impact = if zone.has_feature(RoadFeature::PoorLighting) {
            NIGHT_POOR_LIGHTING_IMPACT
        } else {
            NIGHT_IMPACT
        };
        total += i32::from(impact);
        factors.push((
            FactorKind::Night,
            factor("Night Conditions", impact, "Reduced visibility during nighttime hours"),
        ));
    }

    if is_rush_hour(hour) {
        total += i32::from(RUSH_HOUR_IMPACT);
        factors.push((
            FactorKind::RushHour,
            factor(
                "Rush Hour Traffic",
                RUSH_HOUR_IMPACT,
                "Increased vehicle density during peak hours",
            ),
        ));
    }

    if let Some(impact) = weather_impact(weather.condition) {
        let condition = weather.condition.as_str();
        total += i32::from(impact);
        factors.push((
            FactorKind::Weather(weather.condition),
            factor(
                format!("{} Weather", capitalize(condition)),
                impact,
                format!("{} conditions affecting road safety", condition),
            ),
        ));
    }

    if let Some(impact) = surface_impact(weather.road_condition) {
        let surface = weather.road_condition.as_str();
        total += i32::from(impact);
        factors.push((
            FactorKind::Surface(weather.road_condition),
            factor(
                format!("{} Road Surface", capitalize(surface)),
                impact,
                format!("Road surface is {}, reducing traction", surface),
            ),
        ));
    }

    if let Some(impact) = traffic_impact(traffic.level) {
        total += i32::from(impact);
        factors.push((
            FactorKind::Traffic,
            factor(
                "Traffic Congestion",
                impact,
                format!("{} traffic density in this area", traffic.level.as_str()),
            ),
        ));
    }

    // Feature tags are always listed, they never move the score
    for feature in &zone.features {
        let name = feature.display_name();
        factors.push((
            FactorKind::Feature(*feature),
            factor(
                name,
                feature_impact(*feature),
                format!("This zone contains a {}", name.to_lowercase()),
            ),
        ));
    }

    let score = total.clamp(0, 100) as u8;
    let level = RiskLevel::from_score(score);

    // Stable sort keeps insertion order among equal impacts
    factors.sort_by(|a, b| b.1.impact.cmp(&a.1.impact));

    let kinds: Vec<FactorKind> = factors.iter().map(|(kind, _)| *kind).collect();
    let mut factors: Vec<RiskFactor> = factors.into_iter().map(|(_, f)| f).collect();

    let explanation = explanation(&zone.name, &factors, level);
    let suggested_action = suggested_action(level, &kinds);

    factors.truncate(MAX_FACTORS);

    debug!(
        "Scored {} -> {} ({}) with {} factors",
        zone.id,
        score,
        level,
        factors.len()
    );

    RiskScore {
        score,
        level,
        factors,
        explanation,
        suggested_action,
    }
}
