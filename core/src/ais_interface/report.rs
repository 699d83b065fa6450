use crate::prelude::{GeoPoint, TrackingError, TrackingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a tracked object as delivered by a data source.
///
/// Kinematic fields are optional because providers routinely send blanks or
/// text where numbers belong; [`ObjectReport::validate`] decides whether the
/// report is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReport {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    #[serde(default)]
    pub category: String,
    pub observed_at: DateTime<Utc>,
}

/// A report whose position, heading and speed passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub identifier: String,
    pub name: String,
    pub category: String,
    pub position: GeoPoint,
    pub heading_deg: f64,
    pub speed_knots: f64,
    pub observed_at: DateTime<Utc>,
}

impl ObjectReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        heading: f64,
        speed: f64,
        category: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            heading: Some(heading),
            speed: Some(speed),
            category: category.into(),
            observed_at,
        }
    }

    /// Position of the report, or `MalformedReport` when it is missing or out of range.
    pub fn position(&self) -> TrackingResult<GeoPoint> {
        let latitude = self.required("latitude", self.latitude)?;
        let longitude = self.required("longitude", self.longitude)?;
        let point = GeoPoint::new(latitude, longitude);
        point
            .validate()
            .map_err(|_| self.malformed(format!("position {latitude},{longitude} out of range")))?;
        Ok(point)
    }

    pub fn validate(&self) -> TrackingResult<ObjectState> {
        let position = self.position()?;
        let heading = self.required("heading", self.heading)?;
        if !(0.0..360.0).contains(&heading) {
            return Err(self.malformed(format!("heading {heading} outside [0, 360)")));
        }
        let speed = self.required("speed", self.speed)?;
        if speed < 0.0 {
            return Err(self.malformed(format!("negative speed {speed}")));
        }

        Ok(ObjectState {
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            position,
            heading_deg: heading,
            speed_knots: speed,
            observed_at: self.observed_at,
        })
    }

    fn required(&self, field: &str, value: Option<f64>) -> TrackingResult<f64> {
        match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(self.malformed(format!("{field} is not a number ({v})"))),
            None => Err(self.malformed(format!("{field} missing"))),
        }
    }

    fn malformed(&self, reason: String) -> TrackingError {
        TrackingError::MalformedReport {
            identifier: self.identifier.clone(),
            reason,
        }
    }
}
