use crate::ais_interface::{DataSource, ObjectReport};
use crate::prelude::{ScheduleConfig, SourceFailurePolicy, TrackingError, TrackingResult};
use crate::processing::prediction::PredictionEngine;
use crate::processing::store::{DeviationSummary, ResultStore};
use crate::processing::validation::GeoValidator;
use crate::schedule::clock::Clock;
use crate::schedule::sink::{CycleReport, CycleStatus, ResultSink};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, RunCounters};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    Idle,
    Collecting,
    Predicting,
    Waiting,
    Validating,
    Done,
}

/// End-of-run overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub counters: RunCounters,
    pub deviations: DeviationSummary,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Drives collect → predict → wait → validate cycles until the time budget
/// runs out or the run is cancelled.
///
/// Cycle `k` owns the slot `[k * interval, (k + 1) * interval)` measured from
/// the run start and begins only if that slot ends within the budget. Waiting
/// sleeps until the end of the slot, so fetch latency never pushes later
/// slots back; a cycle that overran its slot continues without sleeping.
///
/// Cancellation is only looked at between cycles; a started cycle always
/// runs to the end of its validation step.
pub struct ScheduleController<S, C> {
    config: ScheduleConfig,
    source: S,
    clock: C,
    engine: PredictionEngine,
    validator: GeoValidator,
    store: ResultStore,
    metrics: MetricsRecorder,
    sinks: Vec<Box<dyn ResultSink>>,
    state: ControllerState,
    published: usize,
    logger: LogManager,
}

impl<S: DataSource, C: Clock> ScheduleController<S, C> {
    pub fn new(config: ScheduleConfig, source: S, clock: C) -> TrackingResult<Self> {
        if config.interval.is_zero() {
            return Err(TrackingError::InvalidDuration(
                "cycle interval must be positive".into(),
            ));
        }
        let validator = GeoValidator::new(config.validation_radius_km)?;

        Ok(Self {
            config,
            source,
            clock,
            engine: PredictionEngine::new(),
            validator,
            store: ResultStore::new(),
            metrics: MetricsRecorder::new(),
            sinks: Vec::new(),
            state: ControllerState::Idle,
            published: 0,
            logger: LogManager::new("schedule"),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn counters(&self) -> RunCounters {
        self.metrics.snapshot()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_store(self) -> ResultStore {
        self.store
    }

    pub async fn run(&mut self, cancel: CancellationToken) -> TrackingResult<RunSummary> {
        let lookahead = chrono::Duration::from_std(self.config.lookahead)
            .map_err(|err| TrackingError::InvalidDuration(err.to_string()))?;
        let start = self.clock.elapsed();
        let mut carried: Option<Vec<ObjectReport>> = None;
        let mut index = 0;
        let mut cancelled = false;

        self.logger.record(&format!(
            "run started against {}: lookahead {:?}, interval {:?}, budget {:?}, radius {} km",
            self.source.describe(),
            self.config.lookahead,
            self.config.interval,
            self.config.total_duration,
            self.validator.radius_km()
        ));

        loop {
            if cancel.is_cancelled() {
                self.logger
                    .record(&format!("cancellation observed after {} cycles", index));
                cancelled = true;
                break;
            }
            let deadline = match self
                .slot_end(index)
                .filter(|end| *end <= self.config.total_duration)
                .and_then(|end| start.checked_add(end))
            {
                Some(deadline) => deadline,
                None => break,
            };
            let elapsed = self.clock.elapsed().saturating_sub(start);

            self.metrics.record_cycle_started();
            match self
                .run_cycle(index, elapsed, deadline, lookahead, &mut carried)
                .await
            {
                Ok(report) => self.publish_cycle(&report),
                Err(err) => {
                    self.logger
                        .warn(&format!("cycle {} aborted the run: {}", index, err));
                    self.finish(start, false);
                    return Err(err);
                }
            }
            index += 1;
        }

        Ok(self.finish(start, cancelled))
    }

    async fn run_cycle(
        &mut self,
        index: usize,
        started_at: Duration,
        deadline: Duration,
        lookahead: chrono::Duration,
        carried: &mut Option<Vec<ObjectReport>>,
    ) -> TrackingResult<CycleReport> {
        let mut report = CycleReport::new(index, started_at);

        self.transition(ControllerState::Collecting);
        let collected = match carried.take() {
            Some(snapshot) => Some(snapshot),
            None => self.fetch_with_retry(index, "collection").await?,
        };
        let Some(snapshot) = collected else {
            report.status = CycleStatus::CollectionFailed;
            self.metrics.record_cycle_skipped();
            self.transition(ControllerState::Waiting);
            self.wait_until(deadline).await;
            return Ok(report);
        };
        let snapshot = self.dedupe(snapshot, &mut report);
        report.collected = snapshot.len();
        if snapshot.is_empty() {
            self.logger
                .record(&format!("cycle {}: snapshot contained no objects", index));
        }

        self.transition(ControllerState::Predicting);
        let batch = self.engine.predict(&snapshot, lookahead)?;
        report.predicted = batch.predictions.len();
        report.skipped_reports = batch.skipped;
        self.metrics.record_skipped_reports(batch.skipped);

        self.transition(ControllerState::Waiting);
        self.wait_until(deadline).await;

        self.transition(ControllerState::Validating);
        let Some(next) = self.fetch_with_retry(index, "validation").await? else {
            report.status = CycleStatus::ValidationFailed;
            self.metrics.record_cycle_skipped();
            return Ok(report);
        };
        let outcome = self.validator.match_snapshot(&batch.predictions, &next)?;
        report.unmatched = outcome.unmatched;
        report.skipped_reports += outcome.malformed;
        report.within_tolerance = outcome
            .records
            .iter()
            .filter(|record| record.within_tolerance)
            .count();
        self.metrics.record_unmatched(outcome.unmatched);
        self.metrics.record_skipped_reports(outcome.malformed);
        report.records = self.store.append_cycle(index, outcome.records)?;
        self.metrics.record_cycle_completed();

        *carried = Some(next);
        Ok(report)
    }

    /// Offset from the run start at which slot `index` ends.
    fn slot_end(&self, index: usize) -> Option<Duration> {
        u32::try_from(index + 1)
            .ok()
            .and_then(|slots| self.config.interval.checked_mul(slots))
    }

    async fn wait_until(&self, deadline: Duration) {
        let remaining = deadline.saturating_sub(self.clock.elapsed());
        if remaining.is_zero() {
            self.logger
                .trace_step("slot already over, skipping the wait");
            return;
        }
        self.clock.sleep(remaining).await;
    }

    async fn fetch_with_retry(
        &mut self,
        index: usize,
        phase: &str,
    ) -> TrackingResult<Option<Vec<ObjectReport>>> {
        let attempts = self.config.fetch_attempts.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            match self.source.fetch_snapshot().await {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(TrackingError::SourceUnavailable(reason)) => {
                    self.metrics.record_fetch_failure();
                    self.logger.warn(&format!(
                        "cycle {} {} fetch attempt {}/{} failed: {}",
                        index, phase, attempt, attempts, reason
                    ));
                    last_reason = reason;
                }
                Err(other) => return Err(other),
            }
        }

        match self.config.on_source_failure {
            SourceFailurePolicy::Skip => {
                self.logger
                    .warn(&format!("cycle {} skipped: {} fetch exhausted", index, phase));
                Ok(None)
            }
            SourceFailurePolicy::Abort => Err(TrackingError::SourceUnavailable(format!(
                "cycle {} {} after {} attempts: {}",
                index, phase, attempts, last_reason
            ))),
        }
    }

    fn dedupe(&self, snapshot: Vec<ObjectReport>, report: &mut CycleReport) -> Vec<ObjectReport> {
        let total = snapshot.len();
        let mut seen = HashSet::with_capacity(total);
        let unique: Vec<ObjectReport> = snapshot
            .into_iter()
            .filter(|r| seen.insert(r.identifier.clone()))
            .collect();

        report.duplicates = total - unique.len();
        if report.duplicates > 0 {
            self.metrics.record_duplicates(report.duplicates);
            self.logger.warn(&format!(
                "cycle {}: dropped {} reports with repeated identifiers",
                report.index, report.duplicates
            ));
        }
        unique
    }

    fn publish_cycle(&mut self, report: &CycleReport) {
        self.logger.record(&format!(
            "cycle {} {:?} at {:?}: {} collected, {} predicted, {} validated \
             ({} within {} km), {} skipped, {} unmatched",
            report.index,
            report.status,
            report.started_at,
            report.collected,
            report.predicted,
            report.records,
            report.within_tolerance,
            self.validator.radius_km(),
            report.skipped_reports,
            report.unmatched
        ));

        let appended = self.store.entries_since(self.published);
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.cycle_completed(report, appended, &self.store) {
                self.logger.warn(&format!(
                    "sink {} failed after cycle {}: {}",
                    sink.name(),
                    report.index,
                    err
                ));
            }
        }
        self.published = self.store.len();
    }

    fn finish(&mut self, start: Duration, cancelled: bool) -> RunSummary {
        self.transition(ControllerState::Done);
        let summary = RunSummary {
            counters: self.metrics.snapshot(),
            deviations: self.store.deviation_summary(),
            elapsed: self.clock.elapsed().saturating_sub(start),
            cancelled,
        };

        let table = self.store.export();
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.run_finished(&table, &summary) {
                self.logger
                    .warn(&format!("sink {} failed to flush: {}", sink.name(), err));
            }
        }

        self.logger.record(&format!(
            "run finished: {} cycles ({} completed, {} skipped), {} records, {} within tolerance",
            summary.counters.cycles_attempted,
            summary.counters.cycles_completed,
            summary.counters.cycles_skipped,
            summary.deviations.records,
            summary.deviations.within_tolerance
        ));
        summary
    }

    fn transition(&mut self, next: ControllerState) {
        self.logger
            .trace_step(&format!("{:?} -> {:?}", self.state, next));
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ais_interface::ReplaySource;
    use crate::schedule::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    fn config(total: u64) -> ScheduleConfig {
        ScheduleConfig {
            lookahead: minutes(2),
            interval: minutes(2),
            total_duration: minutes(total),
            validation_radius_km: 5.0,
            fetch_attempts: 2,
            on_source_failure: SourceFailurePolicy::Skip,
        }
    }

    fn snapshot(ids: &[&str], minute: i64) -> Vec<ObjectReport> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(minute);
        ids.iter()
            .map(|id| ObjectReport::new(*id, *id, 51.0, 1.0, 0.0, 0.0, "", at))
            .collect()
    }

    fn unavailable() -> TrackingResult<Vec<ObjectReport>> {
        Err(TrackingError::SourceUnavailable("timeout".into()))
    }

    #[tokio::test]
    async fn rejects_zero_interval_and_negative_radius() {
        let mut cfg = config(6);
        cfg.interval = Duration::ZERO;
        assert!(ScheduleController::new(cfg, ReplaySource::default(), ManualClock::new()).is_err());

        let mut cfg = config(6);
        cfg.validation_radius_km = -1.0;
        assert!(matches!(
            ScheduleController::new(cfg, ReplaySource::default(), ManualClock::new()),
            Err(TrackingError::InvalidRadius(_))
        ));
    }

    #[tokio::test]
    async fn validation_snapshot_is_reused_for_next_cycle() {
        let source = ReplaySource::new(vec![
            snapshot(&["a"], 0),
            snapshot(&["a"], 2),
            snapshot(&["a"], 4),
        ]);
        let mut controller =
            ScheduleController::new(config(4), source, ManualClock::new()).unwrap();
        let summary = controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.counters.cycles_completed, 2);
        assert_eq!(controller.source().fetches(), 3);
        assert_eq!(controller.state(), ControllerState::Done);
        let cycles: Vec<_> = controller.store().history("a").map(|e| e.cycle).collect();
        assert_eq!(cycles, [0, 1]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_within_cycle() {
        let source = ReplaySource::from_outcomes(vec![
            unavailable(),
            Ok(snapshot(&["a"], 0)),
            Ok(snapshot(&["a"], 2)),
        ]);
        let mut controller =
            ScheduleController::new(config(2), source, ManualClock::new()).unwrap();
        let summary = controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.counters.fetch_failures, 1);
        assert_eq!(summary.counters.cycles_completed, 1);
        assert_eq!(summary.deviations.records, 1);
    }

    #[tokio::test]
    async fn exhausted_collection_skips_cycle_and_keeps_cadence() {
        let clock = ManualClock::new();
        let source = ReplaySource::from_outcomes(vec![
            unavailable(),
            unavailable(),
            Ok(snapshot(&["a"], 2)),
            Ok(snapshot(&["a"], 4)),
        ]);
        let mut controller =
            ScheduleController::new(config(4), source, clock.clone()).unwrap();
        let summary = controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.counters.cycles_attempted, 2);
        assert_eq!(summary.counters.cycles_skipped, 1);
        assert_eq!(summary.counters.cycles_completed, 1);
        assert_eq!(clock.sleeps(), vec![minutes(2), minutes(2)]);
        assert_eq!(controller.store().entries()[0].cycle, 1);
    }

    #[tokio::test]
    async fn failed_validation_fetch_drops_predictions() {
        let source = ReplaySource::from_outcomes(vec![
            Ok(snapshot(&["a"], 0)),
            unavailable(),
            unavailable(),
            Ok(snapshot(&["a"], 2)),
            Ok(snapshot(&["a"], 4)),
        ]);
        let mut controller =
            ScheduleController::new(config(4), source, ManualClock::new()).unwrap();
        let summary = controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.counters.cycles_skipped, 1);
        assert_eq!(summary.counters.cycles_completed, 1);
        let cycles: Vec<_> = controller.store().entries().iter().map(|e| e.cycle).collect();
        assert_eq!(cycles, [1]);
    }

    #[tokio::test]
    async fn abort_policy_ends_run_with_source_error() {
        let mut cfg = config(6);
        cfg.on_source_failure = SourceFailurePolicy::Abort;
        let source = ReplaySource::from_outcomes(vec![unavailable(), unavailable()]);
        let mut controller =
            ScheduleController::new(cfg, source, ManualClock::new()).unwrap();

        let err = controller.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackingError::SourceUnavailable(_)));
        assert_eq!(controller.state(), ControllerState::Done);
    }

    #[tokio::test]
    async fn cancelled_token_prevents_any_cycle() {
        let source = ReplaySource::new(vec![snapshot(&["a"], 0)]);
        let mut controller =
            ScheduleController::new(config(6), source, ManualClock::new()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let summary = controller.run(token).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.counters.cycles_attempted, 0);
        assert_eq!(controller.source().fetches(), 0);
    }

    #[tokio::test]
    async fn report_with_unrepresentable_prediction_time_does_not_end_run() {
        let mut first = snapshot(&["a", "b"], 0);
        first[1].observed_at = chrono::DateTime::<Utc>::MAX_UTC;
        let source = ReplaySource::new(vec![first, snapshot(&["a", "b"], 2)]);
        let mut controller =
            ScheduleController::new(config(2), source, ManualClock::new()).unwrap();

        let summary = controller.run(CancellationToken::new()).await.unwrap();
        assert_eq!(summary.counters.cycles_completed, 1);
        assert_eq!(summary.counters.reports_skipped, 1);
        assert_eq!(summary.deviations.records, 1);
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_counted_once() {
        let source =
            ReplaySource::new(vec![snapshot(&["a", "a", "b"], 0), snapshot(&["a", "b"], 2)]);
        let mut controller =
            ScheduleController::new(config(2), source, ManualClock::new()).unwrap();
        let summary = controller.run(CancellationToken::new()).await.unwrap();

        assert_eq!(summary.counters.duplicate_reports, 1);
        assert_eq!(summary.deviations.records, 2);
    }
}
