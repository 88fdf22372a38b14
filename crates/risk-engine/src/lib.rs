//! SafeZone Risk Engine
//!
//! Maps a micro-zone's static attributes plus the current environment
//! (weather, road surface, traffic, hour of day) to a 0-100 risk score,
//! a severity tier and a driver-facing explanation.
//!
//! # Scoring Model
//!
//! ```text
//! score = clamp(base + night + rush_hour + weather + surface + traffic, 0, 100)
//! ```
//!
//! | Modifier   | Condition                     | Impact                  |
//! |------------|-------------------------------|-------------------------|
//! | Night      | hour < 6 or hour > 20         | +25 poor lighting, +15  |
//! | Rush hour  | 7-9 or 16-19                  | +12                     |
//! | Weather    | rain / fog / snow / storm     | +20 / +30 / +35 / +40   |
//! | Surface    | wet / icy / flooded           | +15 / +40 / +50         |
//! | Traffic    | high / congested              | +10 / +20               |
//!
//! Road feature tags are reported as factors but do not move the score;
//! their weight is already folded into the zone's base score.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod narrative;
pub mod scorer;

pub use micro_zones::{MicroZone, RoadFeature};
pub use scorer::calculate_risk_score;

/// Maximum number of factors kept on a score
pub const MAX_FACTORS: usize = 5;

#[derive(Error, Debug, PartialEq)]
pub enum ParseEnvError {
    #[error("Unknown weather condition: {0}")]
    Weather(String),
    #[error("Unknown road surface: {0}")]
    Surface(String),
    #[error("Unknown traffic level: {0}")]
    Traffic(String),
}

/// Severity tiers, ordered from safest to most dangerous
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Step function over the clamped score
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=19 => Self::Safe,
            20..=39 => Self::Low,
            40..=59 => Self::Moderate,
            60..=79 => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Badge label shown next to a score
    pub fn label(&self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Low => "Low Risk",
            Self::Moderate => "Moderate",
            Self::High => "High Risk",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contributor to a risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    /// Impact points (0-100)
    pub impact: u8,
    pub description: String,
}

/// Result of scoring a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Clamped score (0-100)
    pub score: u8,
    pub level: RiskLevel,
    /// At most [`MAX_FACTORS`], highest impact first
    pub factors: Vec<RiskFactor>,
    pub explanation: String,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkyCondition {
    Clear,
    Rain,
    Fog,
    Snow,
    Storm,
}

impl SkyCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Fog => "fog",
            Self::Snow => "snow",
            Self::Storm => "storm",
        }
    }
}

impl FromStr for SkyCondition {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "rain" => Ok(Self::Rain),
            "fog" => Ok(Self::Fog),
            "snow" => Ok(Self::Snow),
            "storm" => Ok(Self::Storm),
            _ => Err(ParseEnvError::Weather(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadSurface {
    Dry,
    Wet,
    Icy,
    Flooded,
}

impl RoadSurface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dry => "dry",
            Self::Wet => "wet",
            Self::Icy => "icy",
            Self::Flooded => "flooded",
        }
    }
}

impl FromStr for RoadSurface {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dry" => Ok(Self::Dry),
            "wet" => Ok(Self::Wet),
            "icy" => Ok(Self::Icy),
            "flooded" => Ok(Self::Flooded),
            _ => Err(ParseEnvError::Surface(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLevel {
    Low,
    Moderate,
    High,
    Congested,
}

impl TrafficLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Congested => "congested",
        }
    }
}

impl FromStr for TrafficLevel {
    type Err = ParseEnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            "congested" => Ok(Self::Congested),
            _ => Err(ParseEnvError::Traffic(s.to_string())),
        }
    }
}

/// Weather as seen from the road
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub condition: SkyCondition,
    /// Visibility percentage (0-100)
    pub visibility: u8,
    pub road_condition: RoadSurface,
}

impl WeatherCondition {
    pub fn clear() -> Self {
        Self {
            condition: SkyCondition::Clear,
            visibility: 100,
            road_condition: RoadSurface::Dry,
        }
    }

    /// Single-line summary, e.g. `rain, road: wet, visibility: 72%`
    pub fn summary(&self) -> String {
        format!(
            "{}, road: {}, visibility: {}%",
            self.condition.as_str(),
            self.road_condition.as_str(),
            self.visibility
        )
    }
}

impl Default for WeatherCondition {
    fn default() -> Self {
        Self::clear()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficDensity {
    pub level: TrafficLevel,
    /// Average speed in km/h
    pub average_speed: f64,
}

impl TrafficDensity {
    pub fn summary(&self) -> String {
        format!(
            "{} traffic, avg speed: {} km/h",
            self.level.as_str(),
            self.average_speed.round()
        )
    }
}

impl Default for TrafficDensity {
    fn default() -> Self {
        Self {
            level: TrafficLevel::Low,
            average_speed: 40.0,
        }
    }
}

/// Everything the scorer needs besides the zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub weather: WeatherCondition,
    pub traffic: TrafficDensity,
    /// Hour of day (0-23)
    pub hour: u8,
}

impl EnvironmentSnapshot {
    pub fn new(weather: WeatherCondition, traffic: TrafficDensity, hour: u8) -> Self {
        Self {
            weather,
            traffic,
            hour: hour % 24,
        }
    }

    pub fn score(&self, zone: &MicroZone) -> RiskScore {
        calculate_risk_score(zone, &self.weather, &self.traffic, self.hour)
    }

    /// Night window: before 06:00 or after 20:59
    pub fn is_night(&self) -> bool {
        is_night(self.hour)
    }
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        Self::new(WeatherCondition::default(), TrafficDensity::default(), 12)
    }
}

pub fn is_night(hour: u8) -> bool {
    hour < 6 || hour > 20
}

pub fn is_rush_hour(hour: u8) -> bool {
    (7..=9).contains(&hour) || (16..=19).contains(&hour)
}
