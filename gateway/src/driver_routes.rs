//! Driver session routes: position, toggles, alerts and the event stream

use alert_policy::{Alert, DriverLocation, LocationError};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::warn;
use uuid::Uuid;

use crate::driver::{DriverEvent, DriverStatus};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub fn driver_router() -> Router<AppState> {
    Router::new()
        .route("/driver/status", get(driver_status))
        .route("/driver/location", post(report_location))
        .route("/driver/location/error", post(report_location_error))
        .route("/driver/tracking", post(set_tracking))
        .route("/driver/voice", post(set_voice))
        .route("/driver/events", get(driver_events))
        .route("/alerts", get(list_alerts))
        .route("/alerts/dismiss", post(dismiss_active))
        .route("/alerts/:id/acknowledge", post(acknowledge_alert))
}

/// Client-side fix; heading and speed may be unknown
#[derive(Deserialize)]
pub struct LocationFix {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub heading: f64,
    /// m/s
    #[serde(default)]
    pub speed: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct LocationErrorReport {
    pub code: LocationError,
}

#[derive(Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct AlertListResponse {
    pub count: usize,
    pub alerts: Vec<Alert>,
}

#[derive(Serialize)]
pub struct AcknowledgeResponse {
    pub id: Uuid,
    pub acknowledged: bool,
}

pub async fn driver_status(State(state): State<AppState>) -> Json<DriverStatus> {
    Json(state.session.status().await)
}

pub async fn report_location(
    State(state): State<AppState>,
    Json(fix): Json<LocationFix>,
) -> ApiResult<DriverStatus> {
    if !(-90.0..=90.0).contains(&fix.lat) || !(-180.0..=180.0).contains(&fix.lng) {
        return Err(ApiError::BadRequest(format!(
            "Invalid coordinates: {}, {}",
            fix.lat, fix.lng
        )));
    }

    let location = DriverLocation {
        lat: fix.lat,
        lng: fix.lng,
        heading: fix.heading.rem_euclid(360.0),
        speed: if fix.speed.is_finite() { fix.speed.max(0.0) } else { 0.0 },
        timestamp: fix.timestamp.unwrap_or_else(Utc::now),
    };
    state.session.report_location(location).await;
    Ok(Json(state.session.status().await))
}

pub async fn report_location_error(
    State(state): State<AppState>,
    Json(report): Json<LocationErrorReport>,
) -> Json<DriverStatus> {
    state.session.report_location_error(report.code).await;
    Json(state.session.status().await)
}

pub async fn set_tracking(
    State(state): State<AppState>,
    Json(toggle): Json<Toggle>,
) -> Json<DriverStatus> {
    state.session.set_tracking(toggle.enabled).await;
    Json(state.session.status().await)
}

pub async fn set_voice(
    State(state): State<AppState>,
    Json(toggle): Json<Toggle>,
) -> Json<DriverStatus> {
    state.session.set_voice(toggle.enabled).await;
    Json(state.session.status().await)
}

/// Alert history, most recent first
pub async fn list_alerts(State(state): State<AppState>) -> Json<AlertListResponse> {
    let alerts = state.session.alerts().await;
    Json(AlertListResponse {
        count: alerts.len(),
        alerts,
    })
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<AcknowledgeResponse> {
    if !state.session.acknowledge(id).await {
        return Err(ApiError::AlertNotFound(id));
    }
    Ok(Json(AcknowledgeResponse {
        id,
        acknowledged: true,
    }))
}

pub async fn dismiss_active(State(state): State<AppState>) -> ApiResult<AcknowledgeResponse> {
    let id = state
        .session
        .dismiss_active()
        .await
        .ok_or(ApiError::NoActiveAlert)?;
    Ok(Json(AcknowledgeResponse {
        id,
        acknowledged: true,
    }))
}

fn event_name(event: &DriverEvent) -> &'static str {
    match event {
        DriverEvent::Location { .. } => "location",
        DriverEvent::TrackingError { .. } => "tracking_error",
        DriverEvent::TrackingChanged { .. } => "tracking_changed",
        DriverEvent::Environment { .. } => "environment",
        DriverEvent::Alert { .. } => "alert",
        DriverEvent::AlertAcknowledged { .. } => "alert_acknowledged",
        DriverEvent::Reasoning { .. } => "reasoning",
        DriverEvent::Voice { .. } => "voice",
    }
}

/// Server-sent stream of [`DriverEvent`]s
pub async fn driver_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.session.subscribe()).filter_map(|msg| match msg {
        Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                warn!("Failed to encode driver event: {}", e);
                None
            }
        },
        Err(e) => {
            warn!("Event stream subscriber lagging: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{read_json, test_app};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_location_fix_updates_status() {
        let (app, _) = test_app();
        let res = app
            .oneshot(post_json(
                "/api/v1/driver/location",
                r#"{"lat":37.8021,"lng":-122.4187,"speed":12.5}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["tracking"]["is_tracking"], true);
        assert_eq!(body["nearest"]["zone_id"], "zone-001");
        assert_eq!(body["tracking"]["location"]["speed"], 12.5);
    }

    #[tokio::test]
    async fn test_invalid_fix_rejected() {
        let (app, _) = test_app();
        let res = app
            .oneshot(post_json("/api/v1/driver/location", r#"{"lat":91.0,"lng":0.0}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_location_error_reported() {
        let (app, _) = test_app();
        let res = app
            .oneshot(post_json(
                "/api/v1/driver/location/error",
                r#"{"code":"permission_denied"}"#,
            ))
            .await
            .unwrap();
        let body = read_json(res).await;
        assert_eq!(body["tracking"]["is_tracking"], false);
        assert_eq!(
            body["tracking"]["error"],
            "Location permission denied. Please enable location services."
        );
    }

    #[tokio::test]
    async fn test_alert_flow() {
        let (app, session) = test_app();

        // Park on Lombard Street and force an evaluation
        app.clone()
            .oneshot(post_json(
                "/api/v1/driver/location",
                r#"{"lat":37.8021,"lng":-122.4187,"speed":8.0}"#,
            ))
            .await
            .unwrap();
        let alerts = session.alert_tick(chrono::Utc::now()).await;
        assert_eq!(alerts.len(), 1);
        let id = alerts[0].id;

        let res = app
            .clone()
            .oneshot(Request::get("/api/v1/alerts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(read_json(res).await["count"], 1);

        let res = app
            .clone()
            .oneshot(post_json(&format!("/api/v1/alerts/{}/acknowledge", id), ""))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await["acknowledged"], true);

        // Acknowledging cleared the active alert
        let res = app
            .clone()
            .oneshot(post_json("/api/v1/alerts/dismiss", ""))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .oneshot(post_json(
                &format!("/api/v1/alerts/{}/acknowledge", uuid::Uuid::new_v4()),
                "",
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_voice_toggle() {
        let (app, _) = test_app();
        let res = app
            .oneshot(post_json("/api/v1/driver/voice", r#"{"enabled":false}"#))
            .await
            .unwrap();
        assert_eq!(read_json(res).await["voice_enabled"], false);
    }
}
