//! Micro-Zone Registry
//!
//! Static set of hazardous road micro-zones (sharp curves, blind
//! intersections, school corridors) used by the risk engine and the alert
//! policy. The registry is a plain `Vec`: lookups are linear scans, which is
//! all a few dozen records need.
//!
//! Distances are great-circle (haversine) kilometres.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

pub mod export;
pub mod loader;

/// Earth radius in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default search radius for [`ZoneRegistry::near`] callers
pub const DEFAULT_NEAR_RADIUS_KM: f64 = 5.0;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Zone not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid zone {id}: {reason}")]
    Invalid { id: String, reason: String },
    #[error("Duplicate zone id: {0}")]
    Duplicate(String),
    #[error("No zones loaded")]
    Empty,
}

pub type Result<T> = std::result::Result<T, ZoneError>;

/// Road feature tags attached to a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadFeature {
    SharpCurve,
    BlindIntersection,
    PoorLighting,
    SteepSlope,
    NarrowRoad,
    HighTraffic,
    SchoolZone,
    PedestrianCrossing,
    Construction,
}

impl RoadFeature {
    pub const ALL: [RoadFeature; 9] = [
        Self::SharpCurve,
        Self::BlindIntersection,
        Self::PoorLighting,
        Self::SteepSlope,
        Self::NarrowRoad,
        Self::HighTraffic,
        Self::SchoolZone,
        Self::PedestrianCrossing,
        Self::Construction,
    ];

    /// Human-readable name used in risk factors and announcements
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SharpCurve => "Sharp Curve",
            Self::BlindIntersection => "Blind Intersection",
            Self::PoorLighting => "Poor Lighting",
            Self::SteepSlope => "Steep Slope",
            Self::NarrowRoad => "Narrow Road",
            Self::HighTraffic => "High Traffic Area",
            Self::SchoolZone => "School Zone",
            Self::PedestrianCrossing => "Pedestrian Crossing",
            Self::Construction => "Construction Zone",
        }
    }

    /// Snake-case tag as it appears in zone files
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SharpCurve => "sharp_curve",
            Self::BlindIntersection => "blind_intersection",
            Self::PoorLighting => "poor_lighting",
            Self::SteepSlope => "steep_slope",
            Self::NarrowRoad => "narrow_road",
            Self::HighTraffic => "high_traffic",
            Self::SchoolZone => "school_zone",
            Self::PedestrianCrossing => "pedestrian_crossing",
            Self::Construction => "construction",
        }
    }
}

impl fmt::Display for RoadFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A hazardous road micro-zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroZone {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Zone radius in meters
    pub radius_m: f64,
    pub features: Vec<RoadFeature>,
    /// Static risk before environmental modifiers (0-100)
    pub base_risk_score: u8,
    pub description: String,
}

impl MicroZone {
    pub fn has_feature(&self, feature: RoadFeature) -> bool {
        self.features.contains(&feature)
    }

    /// Distance in km from a point to the zone centre
    pub fn distance_km(&self, lat: f64, lng: f64) -> f64 {
        haversine_km(lat, lng, self.lat, self.lng)
    }
}

/// Immutable zone registry
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<MicroZone>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<MicroZone>) -> Self {
        Self { zones }
    }

    /// Registry with the built-in San Francisco demo zones
    pub fn with_defaults() -> Self {
        Self::new(default_zones())
    }

    /// Load a registry from a JSON array of zones
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        loader::load_zones(path).map(Self::new)
    }

    pub fn all(&self) -> &[MicroZone] {
        &self.zones
    }

    pub fn iter(&self) -> impl Iterator<Item = &MicroZone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&MicroZone> {
        self.zones
            .iter()
            .find(|z| z.id == id)
            .ok_or_else(|| ZoneError::NotFound(id.to_string()))
    }

    /// Zones whose centre lies within `radius_km` of the point (inclusive)
    pub fn near(&self, lat: f64, lng: f64, radius_km: f64) -> Vec<&MicroZone> {
        self.zones
            .iter()
            .filter(|z| z.distance_km(lat, lng) <= radius_km)
            .collect()
    }

    /// Every zone paired with its distance in km from the point
    pub fn with_distances(&self, lat: f64, lng: f64) -> impl Iterator<Item = (&MicroZone, f64)> {
        self.zones.iter().map(move |z| (z, z.distance_km(lat, lng)))
    }

    /// Closest zone to the point; first one wins on ties
    pub fn nearest(&self, lat: f64, lng: f64) -> Option<(&MicroZone, f64)> {
        self.with_distances(lat, lng).fold(None, |best, (zone, dist)| match best {
            Some((_, best_dist)) if best_dist <= dist => best,
            _ => Some((zone, dist)),
        })
    }
}

/// Haversine distance between two points in km
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlng = (lng2 - lng1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Built-in demo zones around San Francisco
pub fn default_zones() -> Vec<MicroZone> {
    use RoadFeature::*;

    let zones = [
        (
            "zone-001",
            "Lombard Street Curve",
            37.8021,
            -122.4187,
            150.0,
            vec![SharpCurve, SteepSlope, HighTraffic],
            65,
            "Famous winding street with 8 hairpin turns and 27% grade",
        ),
        (
            "zone-002",
            "Golden Gate Bridge North",
            37.8324,
            -122.4795,
            300.0,
            vec![HighTraffic, NarrowRoad],
            45,
            "High-traffic bridge approach with limited visibility during fog",
        ),
        (
            "zone-003",
            "Twin Peaks Boulevard",
            37.7544,
            -122.4477,
            200.0,
            vec![SharpCurve, SteepSlope, PoorLighting],
            70,
            "Winding mountain road with sharp curves and limited lighting at night",
        ),
        (
            "zone-004",
            "Market & Van Ness Junction",
            37.7749,
            -122.4194,
            100.0,
            vec![BlindIntersection, HighTraffic, PedestrianCrossing],
            55,
            "Major intersection with heavy pedestrian and vehicle traffic",
        ),
        (
            "zone-005",
            "Embarcadero Curve",
            37.7955,
            -122.3937,
            180.0,
            vec![SharpCurve, PedestrianCrossing, HighTraffic],
            50,
            "Curved waterfront road with tourist foot traffic",
        ),
        (
            "zone-006",
            "19th Avenue School Zone",
            37.7299,
            -122.4745,
            250.0,
            vec![SchoolZone, PedestrianCrossing, HighTraffic],
            60,
            "Multiple schools along corridor with heavy pedestrian activity",
        ),
        (
            "zone-007",
            "Geary Boulevard Construction",
            37.7832,
            -122.4556,
            200.0,
            vec![Construction, NarrowRoad, HighTraffic],
            55,
            "Active construction zone with lane restrictions",
        ),
        (
            "zone-008",
            "Divisadero Hill",
            37.7870,
            -122.4382,
            150.0,
            vec![SteepSlope, BlindIntersection, PoorLighting],
            58,
            "Steep hill with limited visibility at cross streets",
        ),
    ];

    zones
        .into_iter()
        .map(|(id, name, lat, lng, radius_m, features, base, description)| MicroZone {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lng,
            radius_m,
            features,
            base_risk_score: base,
            description: description.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_registry() {
        let registry = ZoneRegistry::with_defaults();
        assert_eq!(registry.len(), 8);

        let twin_peaks = registry.get("zone-003").unwrap();
        assert_eq!(twin_peaks.name, "Twin Peaks Boulevard");
        assert!(twin_peaks.has_feature(RoadFeature::PoorLighting));

        assert!(matches!(registry.get("zone-999"), Err(ZoneError::NotFound(_))));
    }

    #[test]
    fn test_haversine() {
        // Market & Van Ness to Lombard Street: ~3.0 km
        let dist = haversine_km(37.7749, -122.4194, 37.8021, -122.4187);
        assert!((dist - 3.02).abs() < 0.05);

        let dist = haversine_km(37.7749, -122.4194, 37.7749, -122.4194);
        assert_eq!(dist, 0.0);
    }

    #[test]
    fn test_near_and_nearest() {
        let registry = ZoneRegistry::with_defaults();

        // Standing on Market & Van Ness
        let (nearest, dist) = registry.nearest(37.7749, -122.4194).unwrap();
        assert_eq!(nearest.id, "zone-004");
        assert!(dist < 0.001);

        let close = registry.near(37.7749, -122.4194, 0.5);
        assert_eq!(close.len(), 1);

        let city = registry.near(37.7749, -122.4194, DEFAULT_NEAR_RADIUS_KM);
        assert!(city.len() >= 6);

        assert!(ZoneRegistry::default().nearest(0.0, 0.0).is_none());
    }

    #[test]
    fn test_feature_tags_serialize_snake_case() {
        let json = serde_json::to_string(&RoadFeature::BlindIntersection).unwrap();
        assert_eq!(json, "\"blind_intersection\"");
        for feature in RoadFeature::ALL {
            assert_eq!(feature.to_string(), feature.tag());
        }
    }

    proptest! {
        #[test]
        fn haversine_is_symmetric(
            lat1 in -90.0f64..90.0,
            lng1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0,
            lng2 in -180.0f64..180.0,
        ) {
            let ab = haversine_km(lat1, lng1, lat2, lng2);
            let ba = haversine_km(lat2, lng2, lat1, lng1);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!(haversine_km(lat1, lng1, lat1, lng1).abs() < 1e-9);
        }
    }
}
