//! Driver position fixes and tracking status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single position fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub lat: f64,
    pub lng: f64,
    /// Heading in degrees (0-360)
    pub heading: f64,
    /// Ground speed as reported by the position source (m/s)
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
}

/// Reasons a position source can fail; the messages are shown to the driver
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationError {
    #[error("Location permission denied. Please enable location services.")]
    PermissionDenied,
    #[error("Location information unavailable.")]
    PositionUnavailable,
    #[error("Location request timed out.")]
    Timeout,
    #[error("Geolocation is not supported by your browser")]
    Unsupported,
    #[error("Unable to get location")]
    Unknown,
}

/// What the driver view shows about the position source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub location: Option<DriverLocation>,
    pub error: Option<String>,
    pub is_tracking: bool,
}

impl TrackingStatus {
    /// Accept a new fix; clears any previous error
    pub fn update(&mut self, location: DriverLocation) {
        self.location = Some(location);
        self.error = None;
        self.is_tracking = true;
    }

    /// Record a failure. Tracking stops and stays off until re-enabled.
    pub fn fail(&mut self, error: LocationError) {
        self.error = Some(error.to_string());
        self.is_tracking = false;
    }

    pub fn stop(&mut self) {
        self.is_tracking = false;
    }
}
