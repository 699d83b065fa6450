use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Geographic point in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rejects non-finite values and coordinates outside the lat/lon ranges.
    pub fn validate(&self) -> TrackingResult<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(TrackingError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// What the controller does once every fetch attempt for a cycle has failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFailurePolicy {
    /// Log, count the cycle as skipped and keep looping.
    #[default]
    Skip,
    /// End the run with `SourceUnavailable`.
    Abort,
}

/// Shared configuration for the prediction/validation schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub lookahead: Duration,
    pub interval: Duration,
    pub total_duration: Duration,
    pub validation_radius_km: f64,
    pub fetch_attempts: u32,
    pub on_source_failure: SourceFailurePolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            lookahead: Duration::from_secs(10 * 60),
            interval: Duration::from_secs(2 * 60),
            total_duration: Duration::from_secs(6 * 60),
            validation_radius_km: 10.0,
            fetch_attempts: 3,
            on_source_failure: SourceFailurePolicy::Skip,
        }
    }
}

/// Common error type for the tracking core.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    #[error("invalid coordinate: lat {latitude}, lon {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("invalid heading: {0} (expected [0, 360))")]
    InvalidHeading(f64),
    #[error("invalid speed: {0}")]
    InvalidSpeed(f64),
    #[error("invalid validation radius: {0}")]
    InvalidRadius(f64),
    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("malformed report {identifier}: {reason}")]
    MalformedReport { identifier: String, reason: String },
    #[error("duplicate record for {identifier} in cycle {cycle}")]
    DuplicateRecord { identifier: String, cycle: usize },
    #[error("result sink failure: {0}")]
    Sink(String),
}

pub type TrackingResult<T> = Result<T, TrackingError>;
