use crate::prelude::TrackingResult;
use crate::processing::store::{ResultStore, ResultTable, StoredResult};
use crate::schedule::controller::RunSummary;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Completed,
    /// No snapshot could be collected; the cycle only waited out its slot.
    CollectionFailed,
    /// Predictions were made but the follow-up snapshot never arrived.
    ValidationFailed,
}

/// Per-cycle bookkeeping handed to result sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub index: usize,
    /// Offset from the start of the run at which the cycle began.
    pub started_at: Duration,
    pub status: CycleStatus,
    pub collected: usize,
    pub duplicates: usize,
    pub predicted: usize,
    pub skipped_reports: usize,
    pub unmatched: usize,
    pub records: usize,
    pub within_tolerance: usize,
}

impl CycleReport {
    pub fn new(index: usize, started_at: Duration) -> Self {
        Self {
            index,
            started_at,
            status: CycleStatus::Completed,
            collected: 0,
            duplicates: 0,
            predicted: 0,
            skipped_reports: 0,
            unmatched: 0,
            records: 0,
            within_tolerance: 0,
        }
    }
}

/// Consumer of the accumulated results (visualizer feed, file log, ...).
///
/// Errors are logged by the controller and never end the run.
pub trait ResultSink: Send {
    fn name(&self) -> &str;

    /// Called after every cycle, with the entries that cycle appended.
    fn cycle_completed(
        &mut self,
        report: &CycleReport,
        appended: &[StoredResult],
        store: &ResultStore,
    ) -> TrackingResult<()>;

    /// Called once when the controller reaches `Done`.
    fn run_finished(&mut self, table: &ResultTable, summary: &RunSummary) -> TrackingResult<()>;
}
