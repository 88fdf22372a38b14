//! GeoJSON export of the zone registry for map clients

use crate::{MicroZone, ZoneRegistry};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};

fn zone_properties(zone: &MicroZone) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("id".to_string(), zone.id.clone().into());
    props.insert("name".to_string(), zone.name.clone().into());
    props.insert("radius_m".to_string(), zone.radius_m.into());
    props.insert("base_risk_score".to_string(), zone.base_risk_score.into());
    props.insert(
        "features".to_string(),
        zone.features
            .iter()
            .map(|f| serde_json::Value::from(f.tag()))
            .collect::<Vec<_>>()
            .into(),
    );
    props.insert("description".to_string(), zone.description.clone().into());
    props
}

/// Point feature at the zone centre; GeoJSON order is [lng, lat]
pub fn zone_feature(zone: &MicroZone) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![zone.lng, zone.lat]))),
        id: None,
        properties: Some(zone_properties(zone)),
        foreign_members: None,
    }
}

impl ZoneRegistry {
    /// Export all zones as a GeoJSON feature collection
    pub fn to_geojson(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.iter().map(zone_feature).collect(),
            foreign_members: None,
        }
    }
}
