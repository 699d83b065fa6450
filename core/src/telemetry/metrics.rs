use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub cycles_attempted: usize,
    pub cycles_completed: usize,
    pub cycles_skipped: usize,
    pub fetch_failures: usize,
    pub reports_skipped: usize,
    pub duplicate_reports: usize,
    pub unmatched_predictions: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<RunCounters>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunCounters::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut RunCounters)) {
        if let Ok(mut counters) = self.inner.lock() {
            apply(&mut counters);
        }
    }

    pub fn record_cycle_started(&self) {
        self.update(|c| c.cycles_attempted += 1);
    }

    pub fn record_cycle_completed(&self) {
        self.update(|c| c.cycles_completed += 1);
    }

    pub fn record_cycle_skipped(&self) {
        self.update(|c| c.cycles_skipped += 1);
    }

    pub fn record_fetch_failure(&self) {
        self.update(|c| c.fetch_failures += 1);
    }

    pub fn record_skipped_reports(&self, count: usize) {
        self.update(|c| c.reports_skipped += count);
    }

    pub fn record_duplicates(&self, count: usize) {
        self.update(|c| c.duplicate_reports += count);
    }

    pub fn record_unmatched(&self, count: usize) {
        self.update(|c| c.unmatched_predictions += count);
    }

    pub fn snapshot(&self) -> RunCounters {
        self.inner.lock().map(|c| *c).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_cycle_started();
        metrics.record_cycle_started();
        metrics.record_cycle_skipped();
        metrics.record_skipped_reports(3);
        metrics.record_skipped_reports(0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_attempted, 2);
        assert_eq!(snapshot.cycles_skipped, 1);
        assert_eq!(snapshot.reports_skipped, 3);
        assert_eq!(snapshot.cycles_completed, 0);
    }
}
