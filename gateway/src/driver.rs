//! Driver Session
//!
//! Owns everything the driver view shows and the periodic tasks that keep it
//! current:
//!
//! | Task        | Period | Runs while                                  |
//! |-------------|--------|---------------------------------------------|
//! | location    | 2 s    | simulated GPS and tracking enabled          |
//! | alerts      | 3 s    | session alive                               |
//! | environment | 20 s   | session alive                               |
//! | voice       | 120 s  | voice on, active alert with a briefing      |
//!
//! Each task holds a child of the session's root [`CancellationToken`].
//! The alert tick scores against the stable environment snapshot that the
//! environment task refreshes, so the two never have to share a timer.

use alert_policy::{
    Alert, AlertPolicy, AlertPolicyConfig, DriverLocation, LocationError, TrackingStatus,
};
use chrono::{DateTime, Local, Timelike, Utc};
use environment_sim::{EnvironmentSimulator, LocationSimulator};
use micro_zones::ZoneRegistry;
use risk_engine::{EnvironmentSnapshot, RiskScore};
use risk_reasoning::{
    generate_or_fallback, ReasoningOutcome, ReasoningProvider, RiskInput, VoiceAnnouncement,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::smoothing::ScoreAnimator;

const EVENT_CAPACITY: usize = 256;

/// Pushed to every event-stream subscriber
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverEvent {
    Location {
        location: DriverLocation,
    },
    TrackingError {
        message: String,
    },
    TrackingChanged {
        is_tracking: bool,
    },
    Environment {
        environment: EnvironmentSnapshot,
        nearest: Option<NearestZone>,
    },
    Alert {
        alert: Alert,
    },
    AlertAcknowledged {
        id: Uuid,
    },
    Reasoning {
        alert_id: Uuid,
        outcome: ReasoningOutcome,
    },
    Voice {
        alert_id: Uuid,
        announcement: VoiceAnnouncement,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestZone {
    pub zone_id: String,
    pub zone_name: String,
    pub distance_km: f64,
    pub risk: RiskScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRisk {
    pub zone_id: String,
    pub zone_name: String,
    pub distance_km: Option<f64>,
    pub risk: RiskScore,
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Serialize)]
pub struct DriverStatus {
    pub tracking: TrackingStatus,
    pub simulated_gps: bool,
    pub environment: EnvironmentSnapshot,
    pub nearest: Option<NearestZone>,
    pub display_score: u8,
    pub active_alert: Option<Alert>,
    pub reasoning: Option<ReasoningOutcome>,
    pub voice_enabled: bool,
    pub last_announcement: Option<VoiceAnnouncement>,
    pub alert_count: usize,
}

struct SessionState {
    tracking: TrackingStatus,
    environment: EnvironmentSnapshot,
    nearest: Option<NearestZone>,
    zone_risks: Vec<ZoneRisk>,
    policy: AlertPolicy,
    /// Briefing for the active alert, keyed by alert id
    reasoning: Option<(Uuid, ReasoningOutcome)>,
    voice_enabled: bool,
    last_announcement: Option<VoiceAnnouncement>,
    env_sim: EnvironmentSimulator,
    location_sim: LocationSimulator,
}

#[derive(Default)]
struct TaskTokens {
    location: Option<CancellationToken>,
    voice: Option<CancellationToken>,
}

pub struct DriverSession {
    state: RwLock<SessionState>,
    registry: Arc<ZoneRegistry>,
    reasoning: Arc<dyn ReasoningProvider>,
    config: GatewayConfig,
    animator: ScoreAnimator,
    events: broadcast::Sender<DriverEvent>,
    root: CancellationToken,
    tasks: Mutex<TaskTokens>,
}

fn current_hour() -> u8 {
    Local::now().hour() as u8
}

fn nearest_zone(
    registry: &ZoneRegistry,
    location: &DriverLocation,
    env: &EnvironmentSnapshot,
) -> Option<NearestZone> {
    registry
        .nearest(location.lat, location.lng)
        .map(|(zone, distance_km)| NearestZone {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            distance_km,
            risk: env.score(zone),
        })
}

fn zone_risks(
    registry: &ZoneRegistry,
    location: Option<&DriverLocation>,
    env: &EnvironmentSnapshot,
) -> Vec<ZoneRisk> {
    registry
        .iter()
        .map(|zone| ZoneRisk {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            distance_km: location.map(|l| zone.distance_km(l.lat, l.lng)),
            risk: env.score(zone),
        })
        .collect()
}

impl DriverSession {
    pub fn new(
        config: GatewayConfig,
        registry: Arc<ZoneRegistry>,
        reasoning: Arc<dyn ReasoningProvider>,
    ) -> Arc<Self> {
        let seed = config.sim_seed;
        let mut env_sim = EnvironmentSimulator::new(seed);
        let location_sim = LocationSimulator::new(
            seed.map(|s| s.wrapping_add(1)),
            environment_sim::DEFAULT_START,
        );

        let environment = env_sim.snapshot(current_hour());

        let mut tracking = TrackingStatus::default();
        if config.simulated_gps {
            tracking.update(location_sim.current());
        }

        let nearest = tracking
            .location
            .as_ref()
            .and_then(|l| nearest_zone(&registry, l, &environment));
        let zone_risks = zone_risks(&registry, tracking.location.as_ref(), &environment);

        let root = CancellationToken::new();
        let animator = ScoreAnimator::new(root.child_token(), config.smoothing);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let state = SessionState {
            tracking,
            environment,
            nearest,
            zone_risks,
            policy: AlertPolicy::new(AlertPolicyConfig::default()),
            reasoning: None,
            voice_enabled: true,
            last_announcement: None,
            env_sim,
            location_sim,
        };

        Arc::new(Self {
            state: RwLock::new(state),
            registry,
            reasoning,
            config,
            animator,
            events,
            root,
            tasks: Mutex::new(TaskTokens::default()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: DriverEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Spawn the periodic tasks
    pub fn start(self: &Arc<Self>) {
        let session = self.clone();
        let token = self.root.child_token();
        let period = self.config.env_refresh;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => session.refresh_environment(current_hour()).await,
                }
            }
            debug!("Environment task stopped");
        });

        let session = self.clone();
        let token = self.root.child_token();
        let period = self.config.alert_tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        session.alert_tick(Utc::now()).await;
                    }
                }
            }
            debug!("Alert task stopped");
        });

        if self.config.simulated_gps {
            self.start_location_task();
        }

        info!(
            "Driver session started (alerts every {:?}, environment every {:?})",
            self.config.alert_tick, self.config.env_refresh
        );
    }

    /// Cancel every task owned by the session.
    ///
    /// Running tasks hold the session, so it is only freed after this.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    fn start_location_task(self: &Arc<Self>) {
        let token = self.root.child_token();
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(previous) = tasks.location.replace(token.clone()) {
                previous.cancel();
            }
        }

        let session = self.clone();
        let period = self.config.location_tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick is immediate; the current fix is already known
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => session.simulate_step(Utc::now()).await,
                }
            }
            debug!("Location task stopped");
        });
    }

    fn stop_location_task(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(token) = tasks.location.take() {
                token.cancel();
            }
        }
    }

    fn start_voice_task(self: &Arc<Self>) {
        let token = self.root.child_token();
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(previous) = tasks.voice.replace(token.clone()) {
                previous.cancel();
            }
        }

        let session = self.clone();
        let period = self.config.voice_repeat;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The immediate announcement is made by whoever started the task
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !session.announce().await {
                            break;
                        }
                    }
                }
            }
            debug!("Voice task stopped");
        });
    }

    fn stop_voice_task(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(token) = tasks.voice.take() {
                token.cancel();
            }
        }
    }

    async fn simulate_step(&self, now: DateTime<Utc>) {
        let location = {
            let mut state = self.state.write().await;
            if !state.tracking.is_tracking {
                return;
            }
            let location = state.location_sim.step(now);
            Self::apply_location(&self.registry, &mut state, location);
            location
        };
        self.emit(DriverEvent::Location { location });
    }

    fn apply_location(registry: &ZoneRegistry, state: &mut SessionState, location: DriverLocation) {
        state.tracking.update(location);
        state.nearest = nearest_zone(registry, &location, &state.environment);
    }

    /// Accept a fix reported by the client
    pub async fn report_location(&self, location: DriverLocation) {
        {
            let mut state = self.state.write().await;
            Self::apply_location(&self.registry, &mut state, location);
        }
        self.emit(DriverEvent::Location { location });
    }

    /// Accept a position-source failure reported by the client
    pub async fn report_location_error(&self, error: LocationError) {
        warn!("Location error: {}", error);
        self.state.write().await.tracking.fail(error);
        self.stop_location_task();
        self.emit(DriverEvent::TrackingError {
            message: error.to_string(),
        });
    }

    pub async fn set_tracking(self: &Arc<Self>, enabled: bool) {
        {
            let mut state = self.state.write().await;
            if enabled {
                if let Some(location) = state.tracking.location {
                    state.tracking.update(location);
                } else {
                    state.tracking.is_tracking = true;
                    state.tracking.error = None;
                }
            } else {
                state.tracking.stop();
            }
        }

        if enabled && self.config.simulated_gps {
            self.start_location_task();
        } else if !enabled {
            self.stop_location_task();
        }

        info!("Tracking {}", if enabled { "enabled" } else { "disabled" });
        self.emit(DriverEvent::TrackingChanged { is_tracking: enabled });
    }

    pub async fn set_voice(self: &Arc<Self>, enabled: bool) {
        self.state.write().await.voice_enabled = enabled;
        if enabled {
            if self.announce().await {
                self.start_voice_task();
            }
        } else {
            self.stop_voice_task();
        }
    }

    /// Draw new conditions and recompute everything derived from them
    pub async fn refresh_environment(&self, hour: u8) {
        let (environment, nearest) = {
            let mut state = self.state.write().await;
            let environment = state.env_sim.snapshot(hour);
            state.environment = environment;

            let location = state.tracking.location;
            state.nearest = location
                .as_ref()
                .and_then(|l| nearest_zone(&self.registry, l, &environment));
            state.zone_risks = zone_risks(&self.registry, location.as_ref(), &environment);
            (environment, state.nearest.clone())
        };

        debug!(
            "Environment refreshed: {}; {}",
            environment.weather.summary(),
            environment.traffic.summary()
        );

        if let Some(nearest) = &nearest {
            self.animator.animate_to(nearest.risk.score);
        }
        self.emit(DriverEvent::Environment {
            environment,
            nearest,
        });
    }

    /// Run the alert policy once against the latest fix
    pub async fn alert_tick(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<Alert> {
        let (alerts, new_active) = {
            let mut state = self.state.write().await;
            let Some(location) = state.tracking.location else {
                return Vec::new();
            };
            let environment = state.environment;
            let previous = state.policy.active().map(|a| a.id);
            let alerts = state
                .policy
                .check(&location, self.registry.iter(), &environment, now);
            let active = state.policy.active().cloned();
            let new_active = active.filter(|a| Some(a.id) != previous);
            if new_active.is_some() {
                state.reasoning = None;
            }
            (alerts, new_active)
        };

        for alert in &alerts {
            self.emit(DriverEvent::Alert {
                alert: alert.clone(),
            });
        }

        if let Some(alert) = new_active {
            self.stop_voice_task();
            let session = self.clone();
            tokio::spawn(async move {
                session.explain(alert).await;
            });
        }

        alerts
    }

    /// Fetch a briefing for `alert` and announce it if it is still active
    pub async fn explain(self: &Arc<Self>, alert: Alert) {
        let input = {
            let state = self.state.read().await;
            let speed = state.tracking.location.map(|l| l.speed).unwrap_or(0.0);
            let features = self
                .registry
                .get(&alert.zone_id)
                .map(|z| z.features.clone())
                .unwrap_or_default();
            RiskInput::from_alert(&alert, speed, &state.environment, &features)
        };

        // No lock held across the network call
        let outcome = generate_or_fallback(
            self.reasoning.as_ref(),
            &alert,
            &input,
            self.config.reasoning.timeout,
        )
        .await;

        {
            let mut state = self.state.write().await;
            if state.policy.active().map(|a| a.id) != Some(alert.id) {
                debug!("Alert {} no longer active; dropping briefing", alert.id);
                return;
            }
            state.reasoning = Some((alert.id, outcome.clone()));
        }

        self.emit(DriverEvent::Reasoning {
            alert_id: alert.id,
            outcome,
        });

        if self.announce().await {
            self.start_voice_task();
        }
    }

    /// Speak the active alert's briefing; false when there is nothing to say
    async fn announce(&self) -> bool {
        let (alert_id, announcement) = {
            let mut state = self.state.write().await;
            if !state.voice_enabled {
                return false;
            }
            let Some(alert) = state.policy.active().cloned() else {
                return false;
            };
            let Some(outcome) = state
                .reasoning
                .as_ref()
                .filter(|(id, _)| *id == alert.id)
                .map(|(_, outcome)| outcome.clone())
            else {
                return false;
            };

            let announcement = VoiceAnnouncement::for_alert(&alert, &outcome.reasoning);
            state.last_announcement = Some(announcement.clone());
            (alert.id, announcement)
        };

        info!("Voice alert: {}", announcement.text);
        self.emit(DriverEvent::Voice {
            alert_id,
            announcement,
        });
        true
    }

    pub async fn acknowledge(&self, id: Uuid) -> bool {
        let (found, cleared) = {
            let mut state = self.state.write().await;
            let was_active = state.policy.active().map(|a| a.id) == Some(id);
            let found = state.policy.acknowledge(id);
            if was_active {
                state.reasoning = None;
            }
            (found, was_active)
        };

        if cleared {
            self.stop_voice_task();
        }
        if found {
            self.emit(DriverEvent::AlertAcknowledged { id });
        }
        found
    }

    pub async fn dismiss_active(&self) -> Option<Uuid> {
        let id = {
            let mut state = self.state.write().await;
            let id = state.policy.dismiss_active()?;
            state.reasoning = None;
            id
        };
        self.stop_voice_task();
        self.emit(DriverEvent::AlertAcknowledged { id });
        Some(id)
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.state.read().await.policy.history().cloned().collect()
    }

    pub async fn environment(&self) -> EnvironmentSnapshot {
        self.state.read().await.environment
    }

    pub async fn zone_risks(&self) -> Vec<ZoneRisk> {
        self.state.read().await.zone_risks.clone()
    }

    pub async fn status(&self) -> DriverStatus {
        let state = self.state.read().await;
        let active_alert = state.policy.active().cloned();
        let reasoning = state
            .reasoning
            .as_ref()
            .filter(|(id, _)| active_alert.as_ref().map(|a| a.id) == Some(*id))
            .map(|(_, outcome)| outcome.clone());

        DriverStatus {
            tracking: state.tracking.clone(),
            simulated_gps: self.config.simulated_gps,
            environment: state.environment,
            nearest: state.nearest.clone(),
            display_score: self.animator.current(),
            active_alert,
            reasoning,
            voice_enabled: state.voice_enabled,
            last_announcement: state.last_announcement.clone(),
            alert_count: state.policy.history_len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use micro_zones::{MicroZone, EARTH_RADIUS_KM};
    use risk_reasoning::{AiReasoning, AlertLevel, OfflineProvider};
    use std::time::Duration;

    const ORIGIN: (f64, f64) = (37.7749, -122.4194);

    struct FixedBriefing;

    #[async_trait]
    impl ReasoningProvider for FixedBriefing {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _input: &RiskInput) -> risk_reasoning::Result<Option<AiReasoning>> {
            Ok(Some(AiReasoning {
                explanation: "Sharp bend on a steep grade".to_string(),
                primary_risk: "Sharp Curve".to_string(),
                recommendations: vec!["Brake early".to_string()],
                safe_speed: "25 km/h".to_string(),
                alert_level: AlertLevel::Warning,
            }))
        }
    }

    fn zone(id: &str, north_km: f64, base: u8) -> MicroZone {
        MicroZone {
            id: id.to_string(),
            name: format!("Zone {}", id),
            lat: ORIGIN.0 + (north_km / EARTH_RADIUS_KM).to_degrees(),
            lng: ORIGIN.1,
            radius_m: 100.0,
            features: vec![],
            base_risk_score: base,
            description: String::new(),
        }
    }

    fn fix() -> DriverLocation {
        DriverLocation {
            lat: ORIGIN.0,
            lng: ORIGIN.1,
            heading: 0.0,
            speed: 10.0,
            timestamp: Utc::now(),
        }
    }

    fn session(provider: Arc<dyn ReasoningProvider>) -> Arc<DriverSession> {
        let config = GatewayConfig {
            simulated_gps: false,
            sim_seed: Some(9),
            ..GatewayConfig::default()
        };
        let registry = ZoneRegistry::new(vec![zone("near", 0.2, 65), zone("far", 3.0, 90)]);
        DriverSession::new(config, Arc::new(registry), provider)
    }

    #[tokio::test]
    async fn test_no_fix_no_alerts() {
        let session = session(Arc::new(OfflineProvider));
        assert!(session.alert_tick(Utc::now()).await.is_empty());
        assert!(!session.status().await.tracking.is_tracking);
    }

    #[tokio::test]
    async fn test_alert_gets_briefing_and_announcement() {
        let session = session(Arc::new(FixedBriefing));
        session.report_location(fix()).await;
        {
            // Pin calm conditions so the score equals the base
            let mut state = session.state.write().await;
            state.environment = EnvironmentSnapshot::default();
        }

        let mut events = session.subscribe();
        let alerts = session.alert_tick(Utc::now()).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone_id, "near");

        let mut saw_voice = false;
        while let Ok(event) = tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            if let Ok(DriverEvent::Voice { announcement, .. }) = event {
                assert!(announcement.text.starts_with("High risk alert! Approaching Zone near."));
                assert!(announcement.text.contains("Recommended speed: 25 km/h. Brake early"));
                saw_voice = true;
                break;
            }
        }
        assert!(saw_voice);

        let status = session.status().await;
        assert_eq!(status.active_alert.as_ref().map(|a| a.zone_id.as_str()), Some("near"));
        assert!(!status.reasoning.unwrap().fallback);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_offline_provider_falls_back() {
        let session = session(Arc::new(OfflineProvider));
        session.report_location(fix()).await;
        session.state.write().await.environment = EnvironmentSnapshot::default();

        let alert = session.alert_tick(Utc::now()).await.remove(0);
        session.explain(alert.clone()).await;

        let status = session.status().await;
        let outcome = status.reasoning.unwrap();
        assert!(outcome.fallback);
        assert_eq!(outcome.reasoning.explanation, "Caution: Zone near ahead with elevated risk.");
        session.shutdown();
    }

    #[tokio::test]
    async fn test_dismiss_clears_active_and_briefing() {
        let session = session(Arc::new(FixedBriefing));
        session.report_location(fix()).await;
        session.state.write().await.environment = EnvironmentSnapshot::default();

        let alert = session.alert_tick(Utc::now()).await.remove(0);
        session.explain(alert.clone()).await;
        assert_eq!(session.dismiss_active().await, Some(alert.id));

        let status = session.status().await;
        assert!(status.active_alert.is_none());
        assert!(status.reasoning.is_none());
        assert!(session.alerts().await[0].acknowledged);
        assert_eq!(session.dismiss_active().await, None);
        session.shutdown();
    }

    #[tokio::test]
    async fn test_location_error_stops_tracking() {
        let session = session(Arc::new(OfflineProvider));
        session.report_location(fix()).await;
        session.report_location_error(LocationError::Timeout).await;

        let status = session.status().await;
        assert!(!status.tracking.is_tracking);
        assert_eq!(status.tracking.error.as_deref(), Some("Location request timed out."));

        session.set_tracking(true).await;
        assert!(session.status().await.tracking.is_tracking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_environment_refresh_animates_display() {
        let session = session(Arc::new(OfflineProvider));
        session.report_location(fix()).await;

        session.refresh_environment(12).await;
        let target = session.status().await.nearest.unwrap().risk.score;

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(session.status().await.display_score, target);
        assert_eq!(session.zone_risks().await.len(), 2);
        session.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_session() {
        let config = GatewayConfig {
            sim_seed: Some(5),
            ..GatewayConfig::default()
        };
        let session = DriverSession::new(
            config,
            Arc::new(ZoneRegistry::with_defaults()),
            Arc::new(OfflineProvider),
        );
        session.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(Arc::strong_count(&session) > 1);

        session.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(Arc::strong_count(&session), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_gps_moves_driver() {
        let config = GatewayConfig {
            sim_seed: Some(4),
            ..GatewayConfig::default()
        };
        let session = DriverSession::new(
            config,
            Arc::new(ZoneRegistry::with_defaults()),
            Arc::new(OfflineProvider),
        );
        let start = session.status().await.tracking.location.unwrap();
        session.start();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        let moved = session.status().await.tracking.location.unwrap();
        assert_ne!((start.lat, start.lng), (moved.lat, moved.lng));

        session.set_tracking(false).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let frozen = session.status().await.tracking.location.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.status().await.tracking.location.unwrap(), frozen);
        session.shutdown();
    }
}
