//! Zone Risk Scoring CLI
//!
//! Scores every micro-zone under a fixed set of conditions.
//!
//! Usage:
//!   score-zones --weather fog --surface wet --traffic high --hour 22
//!   score-zones --zones data/micro_zones.json --json

use anyhow::Result;
use chrono::Timelike;
use clap::Parser;
use micro_zones::ZoneRegistry;
use risk_engine::{
    EnvironmentSnapshot, RoadSurface, SkyCondition, TrafficDensity, TrafficLevel, WeatherCondition,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "score-zones",
    about = "Score SafeZone micro-zones under given road conditions"
)]
struct Args {
    /// Zone file (JSON array); built-in zones when omitted
    #[arg(short = 'z', long)]
    zones: Option<PathBuf>,

    /// Weather: clear, rain, fog, snow, storm
    #[arg(short, long, default_value = "clear")]
    weather: SkyCondition,

    /// Road surface: dry, wet, icy, flooded
    #[arg(short, long, default_value = "dry")]
    surface: RoadSurface,

    /// Traffic: low, moderate, high, congested
    #[arg(short, long, default_value = "moderate")]
    traffic: TrafficLevel,

    /// Hour of day (0-23); current local hour when omitted
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    hour: Option<u8>,

    /// Visibility percentage
    #[arg(long, default_value_t = 100)]
    visibility: u8,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

const NAME_WIDTH: usize = 32;

/// First `width` characters of `name`
fn truncate_name(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = match &args.zones {
        Some(path) => ZoneRegistry::from_json_file(path)?,
        None => ZoneRegistry::with_defaults(),
    };

    let hour = args
        .hour
        .unwrap_or_else(|| chrono::Local::now().hour() as u8);

    let env = EnvironmentSnapshot::new(
        WeatherCondition {
            condition: args.weather,
            visibility: args.visibility.min(100),
            road_condition: args.surface,
        },
        TrafficDensity {
            level: args.traffic,
            average_speed: 30.0,
        },
        hour,
    );

    info!(
        "Scoring {} zones at {:02}:00 ({}; {})",
        registry.len(),
        hour,
        env.weather.summary(),
        env.traffic.level.as_str()
    );

    let mut scored: Vec<_> = registry.iter().map(|z| (z, env.score(z))).collect();
    scored.sort_by(|a, b| b.1.score.cmp(&a.1.score));

    if args.json {
        let out: Vec<serde_json::Value> = scored
            .iter()
            .map(|(zone, risk)| {
                serde_json::json!({
                    "zone_id": zone.id,
                    "zone_name": zone.name,
                    "risk": risk,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{:<10} {:<32} {:>5}  {:<9} {}", "ID", "ZONE", "SCORE", "LEVEL", "ACTION");
    println!("{}", "-".repeat(100));
    for (zone, risk) in &scored {
        println!(
            "{:<10} {:<32} {:>5}  {:<9} {}",
            zone.id,
            truncate_name(&zone.name, NAME_WIDTH),
            risk.score,
            risk.level.as_str(),
            risk.suggested_action
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name_on_char_boundary() {
        let name = "Lombard Street Switchback Curveé Nord";
        let cut = truncate_name(name, NAME_WIDTH);
        assert_eq!(cut.chars().count(), NAME_WIDTH);
        assert!(cut.ends_with("Curveé"));

        assert_eq!(truncate_name("Twin Peaks", NAME_WIDTH), "Twin Peaks");
        assert_eq!(truncate_name("Straße", 5), "Straß");
    }
}
