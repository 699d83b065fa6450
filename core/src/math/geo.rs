//! Great-circle helpers shared by prediction and validation.
//!
//! [`destination`] and [`distance`] work on the same sphere.

use crate::prelude::{GeoPoint, TrackingError, TrackingResult};
use chrono::Duration;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const KM_PER_NAUTICAL_MILE: f64 = 1.852;

/// Haversine distance in kilometres.
///
/// Only numerically identical points short-circuit to zero. Distinct
/// coordinates naming the same place (a pole at any longitude, or longitude
/// 180 against -180) come out within rounding of zero instead.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> TrackingResult<f64> {
    a.validate()?;
    b.validate()?;
    if a == b {
        return Ok(0.0);
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    Ok(2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt()))
}

/// Point reached from `origin` after travelling `duration` at `speed_knots`
/// along the great circle leaving at `heading_deg`.
pub fn destination(
    origin: &GeoPoint,
    heading_deg: f64,
    speed_knots: f64,
    duration: Duration,
) -> TrackingResult<GeoPoint> {
    origin.validate()?;
    if !(0.0..360.0).contains(&heading_deg) {
        return Err(TrackingError::InvalidHeading(heading_deg));
    }
    if !speed_knots.is_finite() || speed_knots < 0.0 {
        return Err(TrackingError::InvalidSpeed(speed_knots));
    }
    if duration < Duration::zero() {
        return Err(TrackingError::InvalidDuration(format!(
            "{} ms",
            duration.num_milliseconds()
        )));
    }
    if duration.is_zero() || speed_knots == 0.0 {
        return Ok(*origin);
    }

    let hours = duration.num_milliseconds() as f64 / 3_600_000.0;
    let angular = speed_knots * KM_PER_NAUTICAL_MILE * hours / EARTH_RADIUS_KM;
    let bearing = heading_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let sin_lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos())
        .clamp(-1.0, 1.0);
    let lat2 = sin_lat2.asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * sin_lat2);

    Ok(GeoPoint::new(
        lat2.to_degrees(),
        normalize_longitude(lon2.to_degrees()),
    ))
}

fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}
