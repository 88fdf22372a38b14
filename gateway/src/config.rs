//! Gateway configuration from environment variables

use risk_reasoning::ReasoningConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 18700;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    /// Zone file; built-in zones when unset
    pub zones_path: Option<PathBuf>,
    /// Fixed seed for every simulator
    pub sim_seed: Option<u64>,
    /// Drive the session from the random-walk GPS instead of client fixes
    pub simulated_gps: bool,
    pub location_tick: Duration,
    pub alert_tick: Duration,
    pub env_refresh: Duration,
    pub voice_repeat: Duration,
    pub smoothing: Duration,
    pub ui_path: PathBuf,
    pub reasoning: ReasoningConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            zones_path: None,
            sim_seed: None,
            simulated_gps: true,
            location_tick: Duration::from_millis(2000),
            alert_tick: Duration::from_millis(3000),
            env_refresh: Duration::from_millis(20_000),
            voice_repeat: Duration::from_secs(120),
            smoothing: Duration::from_millis(2000),
            ui_path: PathBuf::from("ui/dist"),
            reasoning: ReasoningConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn millis_var(name: &str) -> Option<Duration> {
    parse_var::<u64>(name)
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

impl GatewayConfig {
    /// Read configuration from environment variables.
    ///
    /// - `SAFEZONE_GATEWAY_PORT` / `PORT` - listen port (default: 18700)
    /// - `SAFEZONE_ZONES_PATH` - JSON zone file
    /// - `SAFEZONE_SIM_SEED` - simulator seed
    /// - `SAFEZONE_SIMULATED_GPS` - random-walk GPS (default: true)
    /// - `SAFEZONE_LOCATION_TICK_MS` (2000), `SAFEZONE_ALERT_TICK_MS` (3000),
    ///   `SAFEZONE_ENV_REFRESH_MS` (20000), `SAFEZONE_VOICE_REPEAT_SECS` (120)
    /// - `SAFEZONE_UI_PATH` - static UI bundle (default: ui/dist)
    /// - `SAFEZONE_AI_*` - see [`ReasoningConfig::from_env`]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = parse_var("SAFEZONE_GATEWAY_PORT")
            .or_else(|| parse_var("PORT"))
            .unwrap_or(defaults.port);

        let simulated_gps = env::var("SAFEZONE_SIMULATED_GPS")
            .ok()
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(defaults.simulated_gps);

        Self {
            port,
            zones_path: env::var("SAFEZONE_ZONES_PATH").ok().map(PathBuf::from),
            sim_seed: parse_var("SAFEZONE_SIM_SEED"),
            simulated_gps,
            location_tick: millis_var("SAFEZONE_LOCATION_TICK_MS").unwrap_or(defaults.location_tick),
            alert_tick: millis_var("SAFEZONE_ALERT_TICK_MS").unwrap_or(defaults.alert_tick),
            env_refresh: millis_var("SAFEZONE_ENV_REFRESH_MS").unwrap_or(defaults.env_refresh),
            voice_repeat: parse_var::<u64>("SAFEZONE_VOICE_REPEAT_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.voice_repeat),
            smoothing: defaults.smoothing,
            ui_path: env::var("SAFEZONE_UI_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ui_path),
            reasoning: ReasoningConfig::from_env(),
        }
    }
}
