use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vesselcore::prelude::{GeoPoint, ScheduleConfig, SourceFailurePolicy};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPaths {
    pub csv_path: Option<PathBuf>,
    pub geojson_path: Option<PathBuf>,
}

/// Settings read once at startup. Keys from the legacy `config.yaml`
/// (`api_path`, `radius`, `prediction_time_minutes`, `radius_km`) are
/// accepted as aliases.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(alias = "api_path")]
    pub source_endpoint: Option<String>,
    pub default_location: GeoPoint,
    #[serde(alias = "radius")]
    pub search_radius: f64,
    #[serde(alias = "prediction_time_minutes")]
    pub lookahead_minutes: f64,
    pub interval_minutes: f64,
    pub total_duration_minutes: f64,
    #[serde(alias = "radius_km")]
    pub validation_radius_km: f64,
    pub fetch_attempts: u32,
    pub on_source_failure: SourceFailurePolicy,
    pub output_paths: OutputPaths,
    pub bridge_address: SocketAddr,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            source_endpoint: None,
            default_location: GeoPoint::new(0.0, 0.0),
            search_radius: 10.0,
            lookahead_minutes: 10.0,
            interval_minutes: 2.0,
            total_duration_minutes: 6.0,
            validation_radius_km: 10.0,
            fetch_attempts: 3,
            on_source_failure: SourceFailurePolicy::Skip,
            output_paths: OutputPaths::default(),
            bridge_address: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

impl TrackerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading tracker config {}", path_ref.display()))?;
        let config: TrackerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing tracker config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Checks every option the run depends on. `live` requires an endpoint.
    pub fn validate(&self, live: bool) -> anyhow::Result<()> {
        if live && self.source_endpoint.as_deref().map_or(true, str::is_empty) {
            bail!("source_endpoint is required unless running against the simulated fleet");
        }
        self.default_location
            .validate()
            .context("default_location is not a valid coordinate")?;
        if !self.search_radius.is_finite() || self.search_radius < 0.0 {
            bail!("search_radius must be a non-negative number");
        }
        if !self.validation_radius_km.is_finite() || self.validation_radius_km < 0.0 {
            bail!("validation_radius_km must be a non-negative number");
        }
        if self.fetch_attempts == 0 {
            bail!("fetch_attempts must be at least 1");
        }

        let schedule = self.to_schedule_config()?;
        if schedule.interval.is_zero() {
            bail!("interval_minutes must be positive");
        }
        if schedule.total_duration < schedule.interval {
            log::warn!(
                "total_duration_minutes {} is shorter than one interval; no cycle will run",
                self.total_duration_minutes
            );
        }
        if schedule.lookahead != schedule.interval {
            log::warn!(
                "lookahead {} min differs from interval {} min; \
                 predictions are still checked against the next snapshot",
                self.lookahead_minutes,
                self.interval_minutes
            );
        }
        Ok(())
    }

    pub fn to_schedule_config(&self) -> anyhow::Result<ScheduleConfig> {
        Ok(ScheduleConfig {
            lookahead: minutes(self.lookahead_minutes, "lookahead_minutes")?,
            interval: minutes(self.interval_minutes, "interval_minutes")?,
            total_duration: minutes(self.total_duration_minutes, "total_duration_minutes")?,
            validation_radius_km: self.validation_radius_km,
            fetch_attempts: self.fetch_attempts,
            on_source_failure: self.on_source_failure,
        })
    }
}

fn minutes(value: f64, field: &str) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value * 60.0)
        .with_context(|| {
            format!("{} must be a non-negative number of minutes, got {}", field, value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load_yaml(yaml: &str) -> anyhow::Result<TrackerConfig> {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(yaml.as_bytes()).unwrap();
        let path = temp.into_temp_path();
        TrackerConfig::load(&path)
    }

    #[test]
    fn config_load_reads_yaml() {
        let cfg = load_yaml(
            "source_endpoint: http://feed.local/vessels\n\
             default_location: { latitude: 37.7749, longitude: -122.4194 }\n\
             search_radius: 25\n\
             lookahead_minutes: 2\n\
             interval_minutes: 2\n\
             total_duration_minutes: 30\n\
             validation_radius_km: 1.5\n\
             on_source_failure: abort\n\
             output_paths: { csv_path: data/log.csv }\n",
        )
        .unwrap();
        assert_eq!(cfg.search_radius, 25.0);
        assert_eq!(cfg.on_source_failure, SourceFailurePolicy::Abort);
        assert_eq!(cfg.output_paths.csv_path, Some(PathBuf::from("data/log.csv")));
        cfg.validate(true).unwrap();

        let schedule = cfg.to_schedule_config().unwrap();
        assert_eq!(schedule.total_duration, Duration::from_secs(30 * 60));
        assert_eq!(schedule.validation_radius_km, 1.5);
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let cfg = load_yaml(
            "api_path: http://feed.local/api\n\
             radius: 12\n\
             prediction_time_minutes: 4\n\
             radius_km: 3\n",
        )
        .unwrap();
        assert_eq!(cfg.source_endpoint.as_deref(), Some("http://feed.local/api"));
        assert_eq!(cfg.search_radius, 12.0);
        assert_eq!(cfg.lookahead_minutes, 4.0);
        assert_eq!(cfg.validation_radius_km, 3.0);
        assert_eq!(cfg.interval_minutes, 2.0);
    }

    #[test]
    fn missing_endpoint_only_matters_for_live_runs() {
        let cfg = TrackerConfig::default();
        assert!(cfg.validate(true).is_err());
        cfg.validate(false).unwrap();
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = TrackerConfig::default();
        cfg.interval_minutes = 0.0;
        assert!(cfg.validate(false).is_err());

        let mut cfg = TrackerConfig::default();
        cfg.lookahead_minutes = -1.0;
        assert!(cfg.validate(false).is_err());

        let mut cfg = TrackerConfig::default();
        cfg.validation_radius_km = -3.0;
        assert!(cfg.validate(false).is_err());

        let mut cfg = TrackerConfig::default();
        cfg.default_location = GeoPoint::new(120.0, 0.0);
        assert!(cfg.validate(false).is_err());

        let mut cfg = TrackerConfig::default();
        cfg.fetch_attempts = 0;
        assert!(cfg.validate(false).is_err());
    }

    #[test]
    fn unreadable_config_reports_path() {
        let err = TrackerConfig::load("/nonexistent/tracker.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tracker.yaml"));
    }
}
