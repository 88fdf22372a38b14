//! Zone registry and risk scoring routes

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use micro_zones::{MicroZone, DEFAULT_NEAR_RADIUS_KM};
use risk_engine::{
    EnvironmentSnapshot, RiskScore, RoadSurface, SkyCondition, TrafficLevel,
};
use serde::{Deserialize, Serialize};

use crate::driver::ZoneRisk;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn zone_router() -> Router<AppState> {
    Router::new()
        .route("/zones", get(list_zones))
        .route("/zones/geojson", get(zones_geojson))
        .route("/zones/risk", get(zone_risks))
        .route("/zones/:id", get(get_zone))
        .route("/risk/score", post(score_zone))
        .route("/environment", get(current_environment))
}

#[derive(Deserialize)]
pub struct ZoneQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct ZoneEntry {
    #[serde(flatten)]
    pub zone: MicroZone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Serialize)]
pub struct ZoneListResponse {
    pub count: usize,
    pub zones: Vec<ZoneEntry>,
}

/// All zones, or those near `lat`/`lng` sorted by distance
pub async fn list_zones(
    State(state): State<AppState>,
    Query(query): Query<ZoneQuery>,
) -> ApiResult<ZoneListResponse> {
    let zones: Vec<ZoneEntry> = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid coordinates: {}, {}",
                    lat, lng
                )));
            }
            let radius = query.radius_km.unwrap_or(DEFAULT_NEAR_RADIUS_KM);
            let mut near: Vec<ZoneEntry> = state
                .registry
                .with_distances(lat, lng)
                .filter(|(_, d)| *d <= radius)
                .map(|(zone, d)| ZoneEntry {
                    zone: zone.clone(),
                    distance_km: Some(d),
                })
                .collect();
            near.sort_by(|a, b| {
                a.distance_km
                    .unwrap_or(f64::MAX)
                    .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
            });
            near
        }
        (None, None) => state
            .registry
            .iter()
            .map(|zone| ZoneEntry {
                zone: zone.clone(),
                distance_km: None,
            })
            .collect(),
        _ => {
            return Err(ApiError::BadRequest(
                "lat and lng must be given together".to_string(),
            ))
        }
    };

    Ok(Json(ZoneListResponse {
        count: zones.len(),
        zones,
    }))
}

pub async fn get_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MicroZone> {
    Ok(Json(state.registry.get(&id)?.clone()))
}

pub async fn zones_geojson(State(state): State<AppState>) -> Json<geojson::FeatureCollection> {
    Json(state.registry.to_geojson())
}

/// Every zone scored against the stable environment snapshot
pub async fn zone_risks(State(state): State<AppState>) -> Json<Vec<ZoneRisk>> {
    Json(state.session.zone_risks().await)
}

pub async fn current_environment(State(state): State<AppState>) -> Json<EnvironmentSnapshot> {
    Json(state.session.environment().await)
}

/// Ad-hoc scoring; unset fields come from the current snapshot
#[derive(Deserialize)]
pub struct ScoreRequest {
    pub zone_id: String,
    pub weather: Option<SkyCondition>,
    pub road_condition: Option<RoadSurface>,
    pub visibility: Option<u8>,
    pub traffic: Option<TrafficLevel>,
    pub hour: Option<u8>,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub zone_id: String,
    pub zone_name: String,
    pub environment: EnvironmentSnapshot,
    pub risk: RiskScore,
}

pub async fn score_zone(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> ApiResult<ScoreResponse> {
    if req.hour.is_some_and(|h| h > 23) {
        return Err(ApiError::BadRequest("hour must be 0-23".to_string()));
    }

    let zone = state.registry.get(&req.zone_id)?;
    let mut env = state.session.environment().await;
    if let Some(condition) = req.weather {
        env.weather.condition = condition;
    }
    if let Some(surface) = req.road_condition {
        env.weather.road_condition = surface;
    }
    if let Some(visibility) = req.visibility {
        env.weather.visibility = visibility.min(100);
    }
    if let Some(level) = req.traffic {
        env.traffic.level = level;
    }
    if let Some(hour) = req.hour {
        env.hour = hour;
    }

    Ok(Json(ScoreResponse {
        zone_id: zone.id.clone(),
        zone_name: zone.name.clone(),
        risk: env.score(zone),
        environment: env,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{read_json, test_app};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_list_and_get_zones() {
        let (app, _) = test_app();

        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/zones").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = read_json(res).await;
        assert_eq!(body["count"], 8);

        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/zones/zone-001").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await["id"], "zone-001");

        let res = app
            .oneshot(Request::get("/api/v1/zones/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(read_json(res).await["error"], "Zone not found: nope");
    }

    #[tokio::test]
    async fn test_near_query_sorted() {
        let (app, _) = test_app();
        let res = app
            .oneshot(
                Request::get("/api/v1/zones?lat=37.7749&lng=-122.4194&radius_km=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        let distances: Vec<f64> = body["zones"]
            .as_array()
            .unwrap()
            .iter()
            .map(|z| z["distance_km"].as_f64().unwrap())
            .collect();
        assert!(distances.iter().all(|d| *d <= 3.0));
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_half_coordinates_rejected() {
        let (app, _) = test_app();
        let res = app
            .oneshot(Request::get("/api/v1/zones?lat=37.7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_geojson_has_feature_per_zone() {
        let (app, _) = test_app();
        let res = app
            .oneshot(Request::get("/api/v1/zones/geojson").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(res).await;
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_score_override() {
        let (app, _) = test_app();
        let req = Request::post("/api/v1/risk/score")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"zone_id":"zone-003","weather":"clear","road_condition":"wet","traffic":"low","hour":12}"#,
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["risk"]["score"], 85);
        assert_eq!(body["risk"]["level"], "critical");
    }
}
