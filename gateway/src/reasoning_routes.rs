//! Reasoning endpoint
//!
//! Answers with `{ reasoning }` on success. Failures answer with
//! `{ error, fallback: true }` and the status the client keys its own
//! fallback on: 429 rate limited, 402 credits depleted, 500 otherwise.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use risk_reasoning::{service_fallback, AiReasoning, ReasoningError, RiskInput};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::AppState;

pub fn reasoning_router() -> Router<AppState> {
    Router::new().route("/reasoning", post(generate_reasoning))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRequest {
    pub risk_input: RiskInput,
}

#[derive(Serialize)]
pub struct ReasoningResponse {
    pub reasoning: AiReasoning,
}

#[derive(Serialize)]
pub struct FallbackResponse {
    pub error: String,
    pub fallback: bool,
}

fn fallback_response(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(FallbackResponse {
            error,
            fallback: true,
        }),
    )
        .into_response()
}

pub async fn generate_reasoning(
    State(state): State<AppState>,
    Json(req): Json<ReasoningRequest>,
) -> Response {
    let input = req.risk_input;
    info!("Generating risk reasoning for: {}", input.zone_name);

    let limit = state.reasoning_timeout;
    let result = match tokio::time::timeout(limit, state.reasoning.generate(&input)).await {
        Ok(result) => result,
        Err(_) => Err(ReasoningError::Timeout(limit)),
    };

    match result {
        Ok(Some(reasoning)) => Json(ReasoningResponse { reasoning }).into_response(),
        Ok(None) => {
            warn!("No briefing content for {}; using service fallback", input.zone_name);
            Json(ReasoningResponse {
                reasoning: service_fallback(&input),
            })
            .into_response()
        }
        Err(e @ ReasoningError::RateLimited) => {
            fallback_response(StatusCode::TOO_MANY_REQUESTS, e.to_string())
        }
        Err(e @ ReasoningError::CreditsDepleted) => {
            fallback_response(StatusCode::PAYMENT_REQUIRED, e.to_string())
        }
        Err(e) => {
            error!("Error generating risk reasoning: {}", e);
            fallback_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{read_json, test_app, test_app_with};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use risk_reasoning::{AiReasoning, ReasoningError, ReasoningProvider, RiskInput};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Failing(fn() -> ReasoningError);

    #[async_trait]
    impl ReasoningProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _input: &RiskInput) -> risk_reasoning::Result<Option<AiReasoning>> {
            Err((self.0)())
        }
    }

    struct Silent;

    #[async_trait]
    impl ReasoningProvider for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn generate(&self, _input: &RiskInput) -> risk_reasoning::Result<Option<AiReasoning>> {
            Ok(None)
        }
    }

    const BODY: &str = r#"{
        "riskInput": {
            "zoneName": "Lombard Street Curve",
            "riskScore": 78,
            "riskLevel": "high",
            "factors": [{"name": "Sharp Curve", "impact": 20, "description": "This zone contains a sharp curve"}],
            "zoneFeatures": ["Sharp Curve", "Steep Slope"],
            "weather": "rain, road: wet, visibility: 72%",
            "traffic": "high traffic, avg speed: 25 km/h",
            "timeOfDay": "evening",
            "distance": 420,
            "speed": 36
        }
    }"#;

    fn request() -> Request<Body> {
        Request::post("/api/v1/reasoning")
            .header("content-type", "application/json")
            .body(Body::from(BODY))
            .unwrap()
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases: [(fn() -> ReasoningError, StatusCode); 3] = [
            (|| ReasoningError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (|| ReasoningError::CreditsDepleted, StatusCode::PAYMENT_REQUIRED),
            (
                || ReasoningError::Network("connection reset".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let (app, _) = test_app_with(Arc::new(Failing(err)));
            let res = app.oneshot(request()).await.unwrap();
            assert_eq!(res.status(), status);
            assert_eq!(read_json(res).await["fallback"], true);
        }
    }

    #[tokio::test]
    async fn test_offline_is_server_error() {
        let (app, _) = test_app();
        let res = app.oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(res).await;
        assert_eq!(body["error"], "SAFEZONE_AI_API_KEY is not configured");
    }

    #[tokio::test]
    async fn test_empty_reply_uses_service_fallback() {
        let (app, _) = test_app_with(Arc::new(Silent));
        let res = app.oneshot(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["reasoning"]["safeSpeed"], "30 km/h");
        assert_eq!(body["reasoning"]["alertLevel"], "WARNING");
        assert_eq!(body["reasoning"]["primaryRisk"], "Sharp Curve");
    }
}
