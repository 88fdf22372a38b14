//! Alert Policy
//!
//! Stateful gate between the risk engine and the driver. On every tick the
//! policy scans all zones, and for each zone that is
//!
//! 1. within `alert_distance_km` of the driver (inclusive),
//! 2. out of its per-zone cooldown, and
//! 3. scored at or above `min_score`,
//!
//! emits an [`Alert`], records it in a bounded most-recent-first history and
//! stamps the zone's cooldown. The cooldown map and the active alert live on
//! the [`AlertPolicy`] value; nothing is global.

use chrono::{DateTime, Duration, Utc};
use micro_zones::MicroZone;
use risk_engine::{EnvironmentSnapshot, RiskScore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

pub mod location;

pub use location::{DriverLocation, LocationError, TrackingStatus};

/// Alert when within 500 m of a zone centre
pub const ALERT_DISTANCE_KM: f64 = 0.5;
/// Seconds between alerts for the same zone
pub const ALERT_COOLDOWN_SECS: i64 = 120;
/// Moderate risk or higher
pub const MIN_ALERT_SCORE: u8 = 40;
pub const HISTORY_CAPACITY: usize = 50;
/// Speed floor for arrival estimates
pub const MIN_ARRIVAL_SPEED: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPolicyConfig {
    pub alert_distance_km: f64,
    pub cooldown_secs: i64,
    pub min_score: u8,
    pub history_capacity: usize,
    pub min_arrival_speed: f64,
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self {
            alert_distance_km: ALERT_DISTANCE_KM,
            cooldown_secs: ALERT_COOLDOWN_SECS,
            min_score: MIN_ALERT_SCORE,
            history_capacity: HISTORY_CAPACITY,
            min_arrival_speed: MIN_ARRIVAL_SPEED,
        }
    }
}

/// A surfaced hazard warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub zone_id: String,
    pub zone_name: String,
    pub risk_score: RiskScore,
    /// Distance to the zone centre in meters
    pub distance_m: f64,
    /// Seconds until arrival at current speed
    pub estimated_arrival_s: u32,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Seconds to cover `distance_m`, with the speed floored at `min_speed`
pub fn estimated_arrival_secs(distance_m: f64, speed: f64, min_speed: f64) -> u32 {
    let speed = speed.max(min_speed).max(f64::EPSILON);
    (distance_m / speed).round() as u32
}

#[derive(Debug, Default)]
pub struct AlertPolicy {
    config: AlertPolicyConfig,
    /// Zone id -> time of the last alert for that zone
    last_alerted: HashMap<String, DateTime<Utc>>,
    /// Most recent first
    history: VecDeque<Alert>,
    active: Option<Alert>,
}

impl AlertPolicy {
    pub fn new(config: AlertPolicyConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_capacity),
            config,
            last_alerted: HashMap::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &AlertPolicyConfig {
        &self.config
    }

    fn cooled_down(&self, zone_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_alerted.get(zone_id) {
            Some(last) => now - *last > Duration::seconds(self.config.cooldown_secs),
            None => true,
        }
    }

    /// Run one evaluation tick and return the alerts it produced
    ///
    /// Every qualifying zone emits independently. When several fire in the
    /// same tick, the highest score (then the nearest) becomes the active
    /// alert rather than whichever zone happened to be scanned last.
    pub fn check<'a>(
        &mut self,
        location: &DriverLocation,
        zones: impl IntoIterator<Item = &'a MicroZone>,
        environment: &EnvironmentSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut emitted = Vec::new();

        for zone in zones {
            let distance_km = zone.distance_km(location.lat, location.lng);
            if distance_km > self.config.alert_distance_km {
                continue;
            }

            if !self.cooled_down(&zone.id, now) {
                debug!("Zone {} in range but cooling down", zone.id);
                continue;
            }

            let risk_score = environment.score(zone);
            if risk_score.score < self.config.min_score {
                continue;
            }

            let distance_m = distance_km * 1000.0;
            let alert = Alert {
                id: Uuid::new_v4(),
                zone_id: zone.id.clone(),
                zone_name: zone.name.clone(),
                risk_score,
                distance_m,
                estimated_arrival_s: estimated_arrival_secs(
                    distance_m,
                    location.speed,
                    self.config.min_arrival_speed,
                ),
                created_at: now,
                acknowledged: false,
            };

            info!(
                "Alert {} for {} (score {}, {:.0} m)",
                alert.id, zone.name, alert.risk_score.score, alert.distance_m
            );

            self.last_alerted.insert(zone.id.clone(), now);
            self.history.push_front(alert.clone());
            emitted.push(alert);
        }

        self.history.truncate(self.config.history_capacity);

        let most_severe = emitted.iter().max_by(|a, b| {
            a.risk_score
                .score
                .cmp(&b.risk_score.score)
                .then_with(|| b.distance_m.total_cmp(&a.distance_m))
        });
        if let Some(alert) = most_severe {
            self.active = Some(alert.clone());
        }

        emitted
    }

    /// Mark an alert acknowledged. Clears the active slot only if it holds `id`.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        let mut found = false;
        for alert in self.history.iter_mut().filter(|a| a.id == id) {
            alert.acknowledged = true;
            found = true;
        }

        if self.active.as_ref().is_some_and(|a| a.id == id) {
            self.active = None;
            found = true;
        }

        found
    }

    /// Acknowledge whatever alert is currently active
    pub fn dismiss_active(&mut self) -> Option<Uuid> {
        let id = self.active.as_ref()?.id;
        self.acknowledge(id);
        Some(id)
    }

    pub fn active(&self) -> Option<&Alert> {
        self.active.as_ref()
    }

    pub fn history(&self) -> impl Iterator<Item = &Alert> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_alerted(&self, zone_id: &str) -> Option<DateTime<Utc>> {
        self.last_alerted.get(zone_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micro_zones::{RoadFeature, EARTH_RADIUS_KM};
    use risk_engine::RiskLevel;

    const ORIGIN: (f64, f64) = (37.7749, -122.4194);

    fn km_north(km: f64) -> f64 {
        ORIGIN.0 + (km / EARTH_RADIUS_KM).to_degrees()
    }

    fn zone_at(id: &str, distance_km: f64, base: u8) -> MicroZone {
        MicroZone {
            id: id.to_string(),
            name: format!("Zone {}", id),
            lat: km_north(distance_km),
            lng: ORIGIN.1,
            radius_m: 150.0,
            features: vec![],
            base_risk_score: base,
            description: String::new(),
        }
    }

    fn driver(speed: f64) -> DriverLocation {
        DriverLocation {
            lat: ORIGIN.0,
            lng: ORIGIN.1,
            heading: 0.0,
            speed,
            timestamp: Utc::now(),
        }
    }

    // Clear, dry, light traffic at noon: score == base
    fn noon() -> EnvironmentSnapshot {
        EnvironmentSnapshot::default()
    }

    #[test]
    fn test_distance_threshold() {
        let mut policy = AlertPolicy::default();
        let now = Utc::now();

        let near = [zone_at("near", 0.4, 45)];
        let alerts = policy.check(&driver(15.0), &near, &noon(), now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].risk_score.score, 45);
        assert_eq!(alerts[0].risk_score.level, RiskLevel::Moderate);
        assert!((alerts[0].distance_m - 400.0).abs() < 0.5);

        let far = [zone_at("far", 0.6, 45)];
        assert!(policy.check(&driver(15.0), &far, &noon(), now).is_empty());
    }

    #[test]
    fn test_distance_limit_is_inclusive() {
        let mut policy = AlertPolicy::default();
        let now = Utc::now();
        let limit = policy.config().alert_distance_km;

        let edge = [zone_at("edge", limit, 45)];
        let alerts = policy.check(&driver(15.0), &edge, &noon(), now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone_id, "edge");

        let past = [zone_at("past", limit + 0.001, 45)];
        assert!(policy.check(&driver(15.0), &past, &noon(), now).is_empty());
    }

    #[test]
    fn test_min_score() {
        let mut policy = AlertPolicy::default();
        let zones = [zone_at("low", 0.1, 39), zone_at("ok", 0.2, 40)];

        let alerts = policy.check(&driver(15.0), &zones, &noon(), Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone_id, "ok");
        // No cooldown stamp for the zone that did not alert
        assert!(policy.last_alerted("low").is_none());
    }

    #[test]
    fn test_cooldown() {
        let mut policy = AlertPolicy::default();
        let zones = [zone_at("z", 0.3, 50)];
        let t0 = Utc::now();

        assert_eq!(policy.check(&driver(15.0), &zones, &noon(), t0).len(), 1);
        assert!(policy
            .check(&driver(15.0), &zones, &noon(), t0 + Duration::seconds(60))
            .is_empty());
        assert!(policy
            .check(&driver(15.0), &zones, &noon(), t0 + Duration::seconds(120))
            .is_empty());
        assert_eq!(
            policy
                .check(&driver(15.0), &zones, &noon(), t0 + Duration::seconds(121))
                .len(),
            1
        );
        assert_eq!(policy.history_len(), 2);
    }

    #[test]
    fn test_multiple_zones_fire_and_most_severe_is_active() {
        let mut policy = AlertPolicy::default();
        let zones = [
            zone_at("a", 0.1, 45),
            zone_at("b", 0.3, 70),
            zone_at("c", 0.2, 50),
        ];

        let alerts = policy.check(&driver(15.0), &zones, &noon(), Utc::now());
        assert_eq!(alerts.len(), 3);
        assert_eq!(policy.active().unwrap().zone_id, "b");

        // History is most recent first
        let order: Vec<&str> = policy.history().map(|a| a.zone_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_history_capacity() {
        let mut policy = AlertPolicy::new(AlertPolicyConfig {
            history_capacity: 3,
            cooldown_secs: 0,
            ..AlertPolicyConfig::default()
        });
        let zones = [zone_at("z", 0.1, 60)];
        let t0 = Utc::now();

        for i in 0..5 {
            policy.check(&driver(15.0), &zones, &noon(), t0 + Duration::seconds(i + 1));
        }
        assert_eq!(policy.history_len(), 3);
        assert_eq!(
            policy.history().next().unwrap().created_at,
            t0 + Duration::seconds(5)
        );
    }

    #[test]
    fn test_acknowledge_and_dismiss() {
        let mut policy = AlertPolicy::default();
        let t0 = Utc::now();

        let first = policy.check(&driver(15.0), &[zone_at("a", 0.1, 50)], &noon(), t0)[0].clone();
        let second = policy.check(&driver(15.0), &[zone_at("b", 0.1, 50)], &noon(), t0)[0].clone();
        assert_eq!(policy.active().unwrap().id, second.id);

        // Acknowledging a non-active alert leaves the active slot alone
        assert!(policy.acknowledge(first.id));
        assert_eq!(policy.active().unwrap().id, second.id);
        assert!(policy.history().find(|a| a.id == first.id).unwrap().acknowledged);

        assert_eq!(policy.dismiss_active(), Some(second.id));
        assert!(policy.active().is_none());
        assert!(policy.history().all(|a| a.acknowledged));

        assert_eq!(policy.dismiss_active(), None);
        assert!(!policy.acknowledge(Uuid::new_v4()));
    }

    #[test]
    fn test_estimated_arrival_uses_speed_floor() {
        assert_eq!(estimated_arrival_secs(400.0, 20.0, MIN_ARRIVAL_SPEED), 20);
        assert_eq!(estimated_arrival_secs(400.0, 0.0, MIN_ARRIVAL_SPEED), 40);
        assert_eq!(estimated_arrival_secs(400.0, 4.0, MIN_ARRIVAL_SPEED), 40);
        assert_eq!(estimated_arrival_secs(400.0, f64::NAN, MIN_ARRIVAL_SPEED), 40);
    }

    #[test]
    fn test_night_poor_lighting_zone_alerts() {
        let mut policy = AlertPolicy::default();
        let mut zone = zone_at("dark", 0.2, 20);
        zone.features.push(RoadFeature::PoorLighting);

        let mut env = noon();
        assert!(policy.check(&driver(15.0), [&zone], &env, Utc::now()).is_empty());

        env.hour = 2;
        let alerts = policy.check(&driver(15.0), [&zone], &env, Utc::now());
        assert_eq!(alerts[0].risk_score.score, 45);
    }
}
