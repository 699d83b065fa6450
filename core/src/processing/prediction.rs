use crate::ais_interface::{ObjectReport, ObjectState};
use crate::math::geo;
use crate::prelude::{GeoPoint, TrackingError, TrackingResult};
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Dead-reckoned position of one object at `predicted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedPosition {
    pub identifier: String,
    pub position: GeoPoint,
    pub predicted_at: DateTime<Utc>,
    pub origin: ObjectState,
}

/// Output of one prediction pass.
#[derive(Debug, Clone, Default)]
pub struct PredictionBatch {
    pub predictions: Vec<PredictedPosition>,
    /// Reports dropped because a kinematic field was missing or unusable.
    pub skipped: usize,
}

/// Constant-velocity extrapolation stage.
pub struct PredictionEngine {
    logger: LogManager,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("prediction"),
        }
    }

    pub fn predict(
        &self,
        reports: &[ObjectReport],
        lookahead: Duration,
    ) -> TrackingResult<PredictionBatch> {
        if lookahead < Duration::zero() {
            return Err(TrackingError::InvalidDuration(format!(
                "negative lookahead {} s",
                lookahead.num_seconds()
            )));
        }

        let mut batch = PredictionBatch {
            predictions: Vec::with_capacity(reports.len()),
            skipped: 0,
        };

        for report in reports {
            match report
                .validate()
                .and_then(|state| self.predict_state(state, lookahead))
            {
                Ok(predicted) => batch.predictions.push(predicted),
                Err(TrackingError::MalformedReport { identifier, reason }) => {
                    self.logger
                        .trace_step(&format!("skipping {}: {}", identifier, reason));
                    batch.skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }

        if batch.skipped > 0 {
            self.logger.warn(&format!(
                "skipped {} of {} reports with unusable kinematics",
                batch.skipped,
                reports.len()
            ));
        }

        Ok(batch)
    }

    pub fn predict_state(
        &self,
        state: ObjectState,
        lookahead: Duration,
    ) -> TrackingResult<PredictedPosition> {
        let position = geo::destination(
            &state.position,
            state.heading_deg,
            state.speed_knots,
            lookahead,
        )?;
        let predicted_at = state
            .observed_at
            .checked_add_signed(lookahead)
            .ok_or_else(|| TrackingError::MalformedReport {
                identifier: state.identifier.clone(),
                reason: format!(
                    "observed_at {} plus {} s lookahead is out of range",
                    state.observed_at,
                    lookahead.num_seconds()
                ),
            })?;

        Ok(PredictedPosition {
            identifier: state.identifier.clone(),
            position,
            predicted_at,
            origin: state,
        })
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}
