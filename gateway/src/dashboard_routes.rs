//! Authority dashboard routes

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use environment_sim::DashboardReport;

use crate::AppState;

pub fn dashboard_router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

/// Simulated analytics rolled up against the current conditions
pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardReport> {
    let environment = state.session.environment().await;
    Json(DashboardReport::generate(
        state.sim_seed,
        state.registry.all(),
        &environment,
        Utc::now(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{read_json, test_app};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_dashboard_report() {
        let (app, _) = test_app();
        let res = app
            .oneshot(Request::get("/api/v1/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(res).await;

        assert_eq!(body["active_zones"], 8);
        assert_eq!(body["top_zones"].as_array().unwrap().len(), 5);
        assert_eq!(body["hourly"].as_array().unwrap().len(), 24);
        assert_eq!(body["weekly_trend"][4]["day"], "Fri");
        assert_eq!(body["weekly_trend"][4]["alerts"], 312);

        let dist = &body["risk_distribution"];
        let total = ["critical", "high", "moderate", "low"]
            .iter()
            .map(|k| dist[*k].as_u64().unwrap())
            .sum::<u64>();
        assert_eq!(total, 8);
    }
}
