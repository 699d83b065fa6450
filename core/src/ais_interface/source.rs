use crate::ais_interface::report::ObjectReport;
use crate::prelude::{TrackingError, TrackingResult};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Supplier of position snapshots.
#[async_trait]
pub trait DataSource: Send {
    /// Returns every report currently known to the provider.
    async fn fetch_snapshot(&mut self) -> TrackingResult<Vec<ObjectReport>>;

    fn describe(&self) -> String {
        "data source".into()
    }
}

/// Replays a recorded sequence of fetch outcomes in order.
///
/// Once the script is exhausted every further fetch reports the source as
/// unavailable.
#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    script: VecDeque<TrackingResult<Vec<ObjectReport>>>,
    fetches: usize,
}

impl ReplaySource {
    pub fn new(snapshots: Vec<Vec<ObjectReport>>) -> Self {
        Self {
            script: snapshots.into_iter().map(Ok).collect(),
            fetches: 0,
        }
    }

    pub fn from_outcomes(outcomes: Vec<TrackingResult<Vec<ObjectReport>>>) -> Self {
        Self {
            script: outcomes.into(),
            fetches: 0,
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl DataSource for ReplaySource {
    async fn fetch_snapshot(&mut self) -> TrackingResult<Vec<ObjectReport>> {
        self.fetches += 1;
        self.script.pop_front().unwrap_or_else(|| {
            Err(TrackingError::SourceUnavailable(
                "replay exhausted".to_string(),
            ))
        })
    }

    fn describe(&self) -> String {
        format!("replay ({} snapshots left)", self.script.len())
    }
}
