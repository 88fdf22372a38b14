//! Simulated authority analytics
//!
//! Aggregate alert and incident figures for the road authority view. The
//! numbers are synthetic; the rollups over them are real.

use crate::rng_from;
use chrono::{DateTime, Utc};
use micro_zones::MicroZone;
use rand::Rng;
use risk_engine::{is_rush_hour, EnvironmentSnapshot, RiskLevel};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PEAK_HOURS: [u8; 4] = [7, 8, 17, 18];
const TOP_ZONES: usize = 5;
/// Zones with more incidents than this need attention
const INCIDENT_ATTENTION_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAnalytics {
    pub zone_id: String,
    pub zone_name: String,
    pub alert_count: u32,
    pub average_risk_score: u8,
    pub peak_hours: Vec<u8>,
    pub incident_count: u32,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: u8,
    pub alerts: u32,
    pub average_risk: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTrend {
    pub day: &'static str,
    pub incidents: u32,
    pub alerts: u32,
}

pub const WEEKLY_TREND: [DailyTrend; 7] = [
    DailyTrend { day: "Mon", incidents: 12, alerts: 234 },
    DailyTrend { day: "Tue", incidents: 8, alerts: 189 },
    DailyTrend { day: "Wed", incidents: 15, alerts: 267 },
    DailyTrend { day: "Thu", incidents: 10, alerts: 223 },
    DailyTrend { day: "Fri", incidents: 18, alerts: 312 },
    DailyTrend { day: "Sat", incidents: 6, alerts: 156 },
    DailyTrend { day: "Sun", incidents: 4, alerts: 134 },
];

/// Zone counts per severity band of the static base score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub critical: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

impl RiskDistribution {
    pub fn from_zones<'a>(zones: impl IntoIterator<Item = &'a MicroZone>) -> Self {
        let mut dist = Self::default();
        for zone in zones {
            match zone.base_risk_score {
                70..=u8::MAX => dist.critical += 1,
                55..=69 => dist.high += 1,
                40..=54 => dist.moderate += 1,
                _ => dist.low += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.moderate + self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopZone {
    pub zone_id: String,
    pub zone_name: String,
    pub average_risk_score: u8,
    pub level: RiskLevel,
    pub alert_count: u32,
    pub incident_count: u32,
    pub status: String,
    pub recommended_action: String,
}

impl TopZone {
    fn from_analytics(a: &ZoneAnalytics) -> Self {
        let status = if a.incident_count > INCIDENT_ATTENTION_THRESHOLD {
            "Needs Attention"
        } else {
            "Monitoring"
        };
        let action = match a.average_risk_score {
            70..=u8::MAX => "Add lighting & signage",
            55..=69 => "Review speed limits",
            _ => "Continue monitoring",
        };

        Self {
            zone_id: a.zone_id.clone(),
            zone_name: a.zone_name.clone(),
            average_risk_score: a.average_risk_score,
            level: RiskLevel::from_score(a.average_risk_score),
            alert_count: a.alert_count,
            incident_count: a.incident_count,
            status: status.to_string(),
            recommended_action: action.to_string(),
        }
    }
}

/// Current conditions panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionsSummary {
    pub weather: String,
    pub traffic: String,
    pub hour: u8,
    pub daylight: String,
}

impl ConditionsSummary {
    pub fn from_snapshot(env: &EnvironmentSnapshot) -> Self {
        let daylight = if (6..20).contains(&env.hour) {
            "Daytime"
        } else {
            "Nighttime"
        };
        Self {
            weather: env.weather.summary(),
            traffic: env.traffic.summary(),
            hour: env.hour,
            daylight: daylight.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub total_alerts: u32,
    pub average_risk_score: u8,
    pub total_incidents: u32,
    pub active_zones: usize,
    pub risk_distribution: RiskDistribution,
    pub top_zones: Vec<TopZone>,
    pub hourly: Vec<HourlyBucket>,
    pub weekly_trend: Vec<DailyTrend>,
    pub conditions: ConditionsSummary,
    pub zones: Vec<ZoneAnalytics>,
}

/// Synthetic per-zone figures
pub fn zone_analytics(rng: &mut impl Rng, zones: &[MicroZone], now: DateTime<Utc>) -> Vec<ZoneAnalytics> {
    zones
        .iter()
        .map(|zone| ZoneAnalytics {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            alert_count: rng.gen_range(100..=599),
            average_risk_score: zone
                .base_risk_score
                .saturating_add(rng.gen_range(0..=19))
                .min(100),
            peak_hours: PEAK_HOURS.to_vec(),
            incident_count: rng.gen_range(0..=19),
            last_updated: now,
        })
        .collect()
}

/// Rush hours run a higher baseline for both alerts and risk
pub fn hourly_buckets(rng: &mut impl Rng) -> Vec<HourlyBucket> {
    (0..24u8)
        .map(|hour| {
            let (alert_base, risk_base) = if is_rush_hour(hour) { (40, 50) } else { (10, 30) };
            HourlyBucket {
                hour,
                alerts: alert_base + rng.gen_range(0..50),
                average_risk: risk_base + rng.gen_range(0..30),
            }
        })
        .collect()
}

impl DashboardReport {
    pub fn generate(
        seed: Option<u64>,
        zones: &[MicroZone],
        env: &EnvironmentSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        let mut rng = rng_from(seed);
        let analytics = zone_analytics(&mut rng, zones, now);
        let hourly = hourly_buckets(&mut rng);
        Self::from_parts(analytics, hourly, zones, env)
    }

    pub fn from_parts(
        analytics: Vec<ZoneAnalytics>,
        hourly: Vec<HourlyBucket>,
        zones: &[MicroZone],
        env: &EnvironmentSnapshot,
    ) -> Self {
        let total_alerts: u32 = analytics.iter().map(|a| a.alert_count).sum();
        let total_incidents: u32 = analytics.iter().map(|a| a.incident_count).sum();
        let average_risk_score = if analytics.is_empty() {
            0
        } else {
            let sum: u32 = analytics.iter().map(|a| u32::from(a.average_risk_score)).sum();
            (f64::from(sum) / analytics.len() as f64).round() as u8
        };

        let mut ranked: Vec<&ZoneAnalytics> = analytics.iter().collect();
        ranked.sort_by(|a, b| b.average_risk_score.cmp(&a.average_risk_score));
        let top_zones = ranked
            .into_iter()
            .take(TOP_ZONES)
            .map(TopZone::from_analytics)
            .collect();

        debug!(
            "Dashboard: {} zones, {} alerts, avg risk {}",
            zones.len(),
            total_alerts,
            average_risk_score
        );

        Self {
            total_alerts,
            average_risk_score,
            total_incidents,
            active_zones: zones.len(),
            risk_distribution: RiskDistribution::from_zones(zones),
            top_zones,
            hourly,
            weekly_trend: WEEKLY_TREND.to_vec(),
            conditions: ConditionsSummary::from_snapshot(env),
            zones: analytics,
        }
    }
}
