use crate::feed::http::HttpDataSource;
use crate::generator::fleet::{FleetConfig, SimulatedFleet};
use crate::gui_bridge::bridge::GuiBridge;
use crate::persistence::csv_log::CsvSink;
use crate::workflow::config::TrackerConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use vesselcore::ais_interface::{DataSource, ObjectReport, ReplaySource};
use vesselcore::schedule::{Clock, RunSummary, ScheduleController, TokioClock};

/// Where snapshots come from.
#[derive(Debug, Clone)]
pub enum SourceMode {
    Live,
    Simulated(FleetConfig),
    /// JSON file holding an array of snapshots, each an array of reports.
    Replay(PathBuf),
}

#[derive(Clone)]
pub struct Runner {
    config: TrackerConfig,
    bridge: Option<GuiBridge>,
}

impl Runner {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            bridge: None,
        }
    }

    /// Publish results through an already serving bridge.
    pub fn with_bridge(mut self, bridge: GuiBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub async fn execute(
        &self,
        mode: &SourceMode,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        match mode {
            SourceMode::Live => {
                let endpoint = self
                    .config
                    .source_endpoint
                    .as_deref()
                    .context("source_endpoint is not configured")?;
                let source = HttpDataSource::new(
                    endpoint,
                    self.config.default_location,
                    self.config.search_radius,
                )?;
                self.run_with(source, TokioClock::new(), cancel).await
            }
            SourceMode::Simulated(fleet) => {
                let schedule = self.config.to_schedule_config()?;
                let source = SimulatedFleet::new(
                    fleet.clone(),
                    self.config.default_location,
                    schedule.interval,
                )?;
                self.run_with(source, TokioClock::new(), cancel).await
            }
            SourceMode::Replay(path) => {
                let source = load_replay(path)?;
                self.run_with(source, TokioClock::new(), cancel).await
            }
        }
    }

    pub async fn run_with<S: DataSource, C: Clock>(
        &self,
        source: S,
        clock: C,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let schedule = self.config.to_schedule_config()?;
        log::info!("polling {}", source.describe());

        let mut controller = ScheduleController::new(schedule, source, clock)
            .context("setting up the schedule controller")?;
        if let Some(path) = self.config.output_paths.csv_path.as_ref() {
            controller = controller.with_sink(Box::new(CsvSink::new(path)));
        }
        let geojson = self.config.output_paths.geojson_path.clone();
        match self.bridge.as_ref() {
            Some(bridge) => {
                controller =
                    controller.with_sink(Box::new(bridge.clone().with_geojson_output(geojson)));
            }
            None if geojson.is_some() => {
                let writer =
                    GuiBridge::new(self.config.default_location).with_geojson_output(geojson);
                controller = controller.with_sink(Box::new(writer));
            }
            None => {}
        }

        let summary = controller.run(cancel).await.context("tracking run failed")?;
        Ok(summary)
    }
}

pub fn load_replay(path: &Path) -> Result<ReplaySource> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading replay file {}", path.display()))?;
    let snapshots: Vec<Vec<ObjectReport>> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing replay file {}", path.display()))?;
    log::info!("loaded {} snapshots from {}", snapshots.len(), path.display());
    Ok(ReplaySource::new(snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vesselcore::prelude::GeoPoint;
    use vesselcore::schedule::ManualClock;

    fn snapshots() -> Vec<Vec<ObjectReport>> {
        let now = Utc::now();
        vec![
            vec![ObjectReport::new("311000001", "ALPHA", 25.0, -77.0, 0.0, 12.0, "Cargo", now)],
            vec![ObjectReport::new("311000001", "ALPHA", 25.006, -77.0, 0.0, 12.0, "Cargo", now)],
            vec![ObjectReport::new("311000001", "ALPHA", 25.012, -77.0, 0.0, 12.0, "Cargo", now)],
        ]
    }

    fn config(dir: &Path) -> TrackerConfig {
        let mut cfg = TrackerConfig::default();
        cfg.default_location = GeoPoint::new(25.0, -77.0);
        cfg.lookahead_minutes = 2.0;
        cfg.interval_minutes = 2.0;
        cfg.total_duration_minutes = 4.0;
        cfg.validation_radius_km = 1.0;
        cfg.output_paths.csv_path = Some(dir.join("log.csv"));
        cfg.output_paths.geojson_path = Some(dir.join("map.geojson"));
        cfg
    }

    #[tokio::test]
    async fn runner_executes_replay_with_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(config(dir.path()));

        let summary = runner
            .run_with(
                ReplaySource::new(snapshots()),
                ManualClock::new(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.counters.cycles_completed, 2);
        assert_eq!(summary.deviations.records, 2);
        assert_eq!(summary.deviations.within_tolerance, 2);
        assert!(!summary.cancelled);

        let mut reader = ::csv::Reader::from_path(dir.path().join("log.csv")).unwrap();
        assert_eq!(reader.records().count(), 2);
        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("map.geojson")).unwrap())
                .unwrap();
        assert_eq!(map["features"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn bridge_receives_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.output_paths = Default::default();
        let bridge = GuiBridge::new(cfg.default_location);
        let runner = Runner::new(cfg).with_bridge(bridge.clone());

        runner
            .run_with(
                ReplaySource::new(snapshots()),
                ManualClock::new(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let model = bridge.snapshot();
        assert_eq!(model.table.len(), 2);
        assert_eq!(model.summary.unwrap().counters.cycles_completed, 2);
    }

    #[test]
    fn replay_file_round_trips_reports() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(serde_json::to_string(&snapshots()).unwrap().as_bytes())
            .unwrap();
        let replay = load_replay(temp.path()).unwrap();
        assert_eq!(replay.remaining(), 3);
    }

    #[test]
    fn malformed_replay_file_names_path() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"{not json").unwrap();
        let err = load_replay(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing replay file"));
    }
}
