//! Zone loading from JSON files

use crate::{MicroZone, Result, RoadFeature, ZoneError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

fn is_valid_longitude(lng: f64) -> bool {
    (-180.0..=180.0).contains(&lng) && lng.is_finite()
}

/// Sanitize ID (alphanumeric, dash, underscore only)
fn sanitize_id(id: String) -> String {
    id.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect()
}

/// Raw zone record; every field optional so one bad record does not sink the file
#[derive(Debug, Deserialize)]
struct RawZone {
    id: Option<String>,
    name: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    radius_m: Option<f64>,
    #[serde(default)]
    features: Vec<RoadFeature>,
    base_risk_score: Option<f64>,
    #[serde(default)]
    description: String,
}

impl RawZone {
    fn validate(self, index: usize) -> std::result::Result<MicroZone, String> {
        let lat = self.lat.filter(|l| is_valid_latitude(*l)).ok_or("invalid latitude")?;
        let lng = self.lng.filter(|l| is_valid_longitude(*l)).ok_or("invalid longitude")?;
        let radius_m = self
            .radius_m
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or("radius must be positive")?;
        let base = self
            .base_risk_score
            .filter(|b| (0.0..=100.0).contains(b))
            .ok_or("base risk score must be within 0-100")?;

        let id = sanitize_id(self.id.unwrap_or_else(|| format!("zone-{:03}", index + 1)));
        if id.is_empty() {
            return Err("empty id".to_string());
        }

        Ok(MicroZone {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            lat,
            lng,
            radius_m,
            features: self.features,
            base_risk_score: base.round() as u8,
            description: self.description,
        })
    }
}

/// Load zones from a JSON array file
///
/// Records with out-of-range coordinates, radius or base score are skipped.
/// Duplicate ids and an empty result are errors.
pub fn load_zones(path: impl AsRef<Path>) -> Result<Vec<MicroZone>> {
    let path = path.as_ref();
    info!("Loading micro-zones from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let raw: Vec<RawZone> = serde_json::from_reader(reader)?;

    let mut zones = Vec::with_capacity(raw.len());
    let mut seen = HashSet::new();
    let mut skipped = 0;

    for (i, record) in raw.into_iter().enumerate() {
        let label = record.id.clone().unwrap_or_else(|| format!("#{}", i));
        match record.validate(i) {
            Ok(zone) => {
                if !seen.insert(zone.id.clone()) {
                    return Err(ZoneError::Duplicate(zone.id));
                }
                zones.push(zone);
            }
            Err(reason) => {
                warn!("Skipping zone {}: {}", label, reason);
                skipped += 1;
            }
        }
    }

    if zones.is_empty() {
        return Err(ZoneError::Empty);
    }

    info!("Loaded {} zones ({} skipped)", zones.len(), skipped);

    Ok(zones)
}
