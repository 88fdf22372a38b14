use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use micro_zones::ZoneRegistry;
use risk_reasoning::{build_provider, ReasoningProvider};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dashboard_routes;
mod driver;
mod driver_routes;
mod error;
mod reasoning_routes;
mod smoothing;
mod zone_routes;

use config::GatewayConfig;
use driver::DriverSession;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ZoneRegistry>,
    pub session: Arc<DriverSession>,
    pub reasoning: Arc<dyn ReasoningProvider>,
    pub reasoning_timeout: Duration,
    pub sim_seed: Option<u64>,
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(zone_routes::zone_router())
        .merge(driver_routes::driver_router())
        .merge(reasoning_routes::reasoning_router())
        .merge(dashboard_routes::dashboard_router())
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn load_registry(config: &GatewayConfig) -> Result<ZoneRegistry> {
    match &config.zones_path {
        Some(path) => ZoneRegistry::from_json_file(path)
            .with_context(|| format!("loading zones from {}", path.display())),
        None => Ok(ZoneRegistry::with_defaults()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "safezone_gateway=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();

    let registry = Arc::new(load_registry(&config)?);
    tracing::info!("   Loaded {} micro-zones", registry.len());

    let reasoning = build_provider(&config.reasoning);
    tracing::info!("   Reasoning provider: {}", reasoning.name());

    let session = DriverSession::new(config.clone(), registry.clone(), reasoning.clone());
    session.start();

    let state = AppState {
        registry,
        session: session.clone(),
        reasoning,
        reasoning_timeout: config.reasoning.timeout,
        sim_seed: config.sim_seed,
    };
    let api_routes = build_router(state);

    let app = if config.ui_path.exists() {
        tracing::info!("   Serving UI from {}", config.ui_path.display());
        api_routes.nest_service("/", ServeDir::new(&config.ui_path))
    } else {
        tracing::warn!("   UI not built at {}", config.ui_path.display());
        api_routes
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("SafeZone gateway starting on {}", addr);
    tracing::info!(
        "   Simulated GPS: {}",
        if config.simulated_gps { "on" } else { "off" }
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down driver session");
            session.shutdown();
        })
        .await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "safezone-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::response::Response;
    use risk_reasoning::OfflineProvider;

    pub fn test_app_with(reasoning: Arc<dyn ReasoningProvider>) -> (Router, Arc<DriverSession>) {
        let config = GatewayConfig {
            sim_seed: Some(7),
            simulated_gps: false,
            ..GatewayConfig::default()
        };
        let registry = Arc::new(ZoneRegistry::with_defaults());
        let session = DriverSession::new(config.clone(), registry.clone(), reasoning.clone());

        let state = AppState {
            registry,
            session: session.clone(),
            reasoning,
            reasoning_timeout: config.reasoning.timeout,
            sim_seed: config.sim_seed,
        };
        (build_router(state), session)
    }

    pub fn test_app() -> (Router, Arc<DriverSession>) {
        test_app_with(Arc::new(OfflineProvider))
    }

    pub async fn read_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
