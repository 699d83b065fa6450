use crate::ais_interface::ObjectReport;
use crate::math::geo;
use crate::prelude::{GeoPoint, TrackingError, TrackingResult};
use crate::processing::prediction::PredictedPosition;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of checking one prediction against the later observed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub predicted: PredictedPosition,
    pub actual: GeoPoint,
    pub actual_observed_at: DateTime<Utc>,
    pub distance_km: f64,
    pub within_tolerance: bool,
}

impl ValidationRecord {
    pub fn identifier(&self) -> &str {
        &self.predicted.identifier
    }
}

/// Result of matching a cycle's predictions against the next snapshot.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub records: Vec<ValidationRecord>,
    /// Predictions whose identifier was absent from the next snapshot.
    pub unmatched: usize,
    /// Matching reports whose position could not be used.
    pub malformed: usize,
}

/// Radius check between predicted and actual positions.
pub struct GeoValidator {
    radius_km: f64,
    logger: LogManager,
}

impl GeoValidator {
    pub fn new(radius_km: f64) -> TrackingResult<Self> {
        check_radius(radius_km)?;
        Ok(Self {
            radius_km,
            logger: LogManager::new("validation"),
        })
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Pairs every prediction with the report carrying the same identifier in
    /// `next`. The first report wins when an identifier repeats.
    pub fn match_snapshot(
        &self,
        predictions: &[PredictedPosition],
        next: &[ObjectReport],
    ) -> TrackingResult<MatchOutcome> {
        let mut by_identifier: HashMap<&str, &ObjectReport> = HashMap::with_capacity(next.len());
        for report in next {
            by_identifier.entry(report.identifier.as_str()).or_insert(report);
        }

        let mut outcome = MatchOutcome::default();
        for predicted in predictions {
            let Some(actual) = by_identifier.get(predicted.identifier.as_str()) else {
                outcome.unmatched += 1;
                continue;
            };
            match validate(predicted, actual, self.radius_km) {
                Ok(record) => outcome.records.push(record),
                Err(TrackingError::MalformedReport { identifier, reason }) => {
                    self.logger
                        .trace_step(&format!("cannot validate {}: {}", identifier, reason));
                    outcome.malformed += 1;
                }
                Err(other) => return Err(other),
            }
        }

        self.logger.trace_step(&format!(
            "matched {} of {} predictions ({} unmatched, {} malformed)",
            outcome.records.len(),
            predictions.len(),
            outcome.unmatched,
            outcome.malformed
        ));
        Ok(outcome)
    }
}

/// Compares one prediction with the actual report of the same object.
pub fn validate(
    predicted: &PredictedPosition,
    actual: &ObjectReport,
    radius_km: f64,
) -> TrackingResult<ValidationRecord> {
    check_radius(radius_km)?;
    let actual_position = actual.position()?;
    let distance_km = geo::distance(&predicted.position, &actual_position)?;

    Ok(ValidationRecord {
        predicted: predicted.clone(),
        actual: actual_position,
        actual_observed_at: actual.observed_at,
        distance_km,
        within_tolerance: distance_km <= radius_km,
    })
}

fn check_radius(radius_km: f64) -> TrackingResult<()> {
    if radius_km.is_finite() && radius_km >= 0.0 {
        Ok(())
    } else {
        Err(TrackingError::InvalidRadius(radius_km))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::prediction::PredictionEngine;
    use chrono::Duration;
    use proptest::prelude::*;

    fn predicted(id: &str, lat: f64, lon: f64) -> PredictedPosition {
        let report = ObjectReport::new(id, id, lat, lon, 0.0, 0.0, "", Utc::now());
        PredictionEngine::new()
            .predict_state(report.validate().unwrap(), Duration::minutes(10))
            .unwrap()
    }

    fn actual(id: &str, lat: f64, lon: f64) -> ObjectReport {
        ObjectReport::new(id, id, lat, lon, 0.0, 0.0, "", Utc::now())
    }

    #[test]
    fn exact_hit_is_within_zero_radius() {
        let record = validate(&predicted("a", 10.0, 10.0), &actual("a", 10.0, 10.0), 0.0).unwrap();
        assert_eq!(record.distance_km, 0.0);
        assert!(record.within_tolerance);
    }

    #[test]
    fn far_miss_is_flagged() {
        let record = validate(&predicted("a", 10.0, 10.0), &actual("a", 11.0, 10.0), 10.0).unwrap();
        assert!(record.distance_km > 100.0);
        assert!(!record.within_tolerance);
    }

    #[test]
    fn negative_radius_is_a_contract_error() {
        assert_eq!(
            validate(&predicted("a", 0.0, 0.0), &actual("a", 0.0, 0.0), -1.0).unwrap_err(),
            TrackingError::InvalidRadius(-1.0)
        );
        assert!(GeoValidator::new(-0.5).is_err());
        assert!(GeoValidator::new(f64::NAN).is_err());
    }

    #[test]
    fn match_snapshot_drops_missing_and_malformed() {
        let validator = GeoValidator::new(10.0).unwrap();
        let predictions = vec![
            predicted("kept", 0.0, 0.0),
            predicted("gone", 1.0, 1.0),
            predicted("broken", 2.0, 2.0),
        ];
        let mut broken = actual("broken", 2.0, 2.0);
        broken.latitude = None;
        let next = vec![actual("kept", 0.01, 0.0), broken, actual("stranger", 5.0, 5.0)];

        let outcome = validator.match_snapshot(&predictions, &next).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].identifier(), "kept");
        assert!(outcome.records[0].within_tolerance);
        assert_eq!(outcome.unmatched, 1);
        assert_eq!(outcome.malformed, 1);
    }

    #[test]
    fn match_snapshot_uses_first_duplicate() {
        let validator = GeoValidator::new(1.0).unwrap();
        let next = vec![actual("a", 0.0, 0.0), actual("a", 5.0, 5.0)];
        let outcome = validator
            .match_snapshot(&[predicted("a", 0.0, 0.0)], &next)
            .unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].actual, GeoPoint::new(0.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_within_tolerance_iff_distance_le_radius(
            lat in -60.0f64..60.0,
            lon in -170.0f64..170.0,
            dlat in -0.5f64..0.5,
            dlon in -0.5f64..0.5,
            radius in 0.0f64..80.0,
        ) {
            let p = predicted("x", lat, lon);
            let a = actual("x", lat + dlat, lon + dlon);
            let record = validate(&p, &a, radius).unwrap();
            let d = geo::distance(&p.position, &a.position().unwrap()).unwrap();
            prop_assert_eq!(record.distance_km, d);
            prop_assert_eq!(record.within_tolerance, d <= radius);
        }
    }
}
