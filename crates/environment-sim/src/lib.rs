//! Environment Simulation
//!
//! Stand-ins for the live feeds a deployed system would read: weather,
//! traffic and the driver's own position. Every simulator owns a
//! [`StdRng`] so a fixed seed replays the same sequence.

use alert_policy::DriverLocation;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use risk_engine::{
    is_rush_hour, EnvironmentSnapshot, RoadSurface, SkyCondition, TrafficDensity, TrafficLevel,
    WeatherCondition,
};

pub mod analytics;

pub use analytics::{DashboardReport, HourlyBucket, ZoneAnalytics};

/// Clear skies are three times as likely as any other condition
const SKY_POOL: [SkyCondition; 5] = [
    SkyCondition::Clear,
    SkyCondition::Rain,
    SkyCondition::Fog,
    SkyCondition::Clear,
    SkyCondition::Clear,
];

const SURFACE_POOL: [RoadSurface; 4] = [
    RoadSurface::Dry,
    RoadSurface::Wet,
    RoadSurface::Dry,
    RoadSurface::Dry,
];

const OFF_PEAK_TRAFFIC: [TrafficLevel; 3] = [
    TrafficLevel::Low,
    TrafficLevel::Moderate,
    TrafficLevel::Moderate,
];

/// Average speed during rush hour (km/h)
pub const RUSH_HOUR_SPEED: f64 = 25.0;

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draws weather and traffic conditions
#[derive(Debug, Clone)]
pub struct EnvironmentSimulator {
    rng: StdRng,
}

impl EnvironmentSimulator {
    pub fn from_entropy() -> Self {
        Self {
            rng: rng_from(None),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: rng_from(Some(seed)),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: rng_from(seed) }
    }

    pub fn weather(&mut self) -> WeatherCondition {
        let condition = *SKY_POOL.choose(&mut self.rng).unwrap_or(&SkyCondition::Clear);
        let visibility = self.rng.gen_range(60..=99);
        let road_condition = *SURFACE_POOL.choose(&mut self.rng).unwrap_or(&RoadSurface::Dry);

        WeatherCondition {
            condition,
            visibility,
            road_condition,
        }
    }

    /// Rush hour is always heavy; otherwise light to moderate flow
    pub fn traffic(&mut self, hour: u8) -> TrafficDensity {
        if is_rush_hour(hour) {
            return TrafficDensity {
                level: TrafficLevel::High,
                average_speed: RUSH_HOUR_SPEED,
            };
        }

        let level = *OFF_PEAK_TRAFFIC
            .choose(&mut self.rng)
            .unwrap_or(&TrafficLevel::Moderate);
        TrafficDensity {
            level,
            average_speed: f64::from(self.rng.gen_range(30u8..=49)),
        }
    }

    pub fn snapshot(&mut self, hour: u8) -> EnvironmentSnapshot {
        let weather = self.weather();
        let traffic = self.traffic(hour);
        EnvironmentSnapshot::new(weather, traffic, hour)
    }
}

/// Starting point for simulated drives (San Francisco city centre)
pub const DEFAULT_START: (f64, f64) = (37.7749, -122.4194);
const START_HEADING: f64 = 45.0;
const START_SPEED: f64 = 35.0;
const MAX_STEP_DEG: f64 = 0.001;
const MAX_HEADING_STEP: f64 = 5.0;
const MAX_SPEED_STEP: f64 = 5.0;
const MAX_SPEED: f64 = 65.0;

/// Random-walk GPS source
#[derive(Debug, Clone)]
pub struct LocationSimulator {
    rng: StdRng,
    current: DriverLocation,
}

impl LocationSimulator {
    pub fn new(seed: Option<u64>, start: (f64, f64)) -> Self {
        Self {
            rng: rng_from(seed),
            current: DriverLocation {
                lat: start.0,
                lng: start.1,
                heading: START_HEADING,
                speed: START_SPEED,
                timestamp: Utc::now(),
            },
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed), DEFAULT_START)
    }

    pub fn current(&self) -> DriverLocation {
        self.current
    }

    /// Advance one step and return the new fix
    pub fn step(&mut self, now: DateTime<Utc>) -> DriverLocation {
        let prev = self.current;
        let lat = prev.lat + self.rng.gen_range(-MAX_STEP_DEG..=MAX_STEP_DEG);
        let lng = prev.lng + self.rng.gen_range(-MAX_STEP_DEG..=MAX_STEP_DEG);
        let heading = wrap_heading(
            prev.heading + self.rng.gen_range(-MAX_HEADING_STEP..=MAX_HEADING_STEP),
        );
        let speed = (prev.speed + self.rng.gen_range(-MAX_SPEED_STEP..=MAX_SPEED_STEP))
            .clamp(0.0, MAX_SPEED);

        self.current = DriverLocation {
            lat,
            lng,
            heading,
            speed,
            timestamp: now,
        };
        self.current
    }
}

/// Normalise to [0, 360)
fn wrap_heading(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl Default for LocationSimulator {
    fn default() -> Self {
        Self::new(None, DEFAULT_START)
    }
}
