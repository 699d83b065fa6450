use crate::gui_bridge::model::VisualizationModel;
use anyhow::{Context, Result};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use vesselcore::prelude::{GeoPoint, TrackingError, TrackingResult};
use vesselcore::processing::{ResultStore, ResultTable, StoredResult};
use vesselcore::schedule::{CycleReport, ResultSink, RunSummary};
use warp::Filter;

type SharedModel = Arc<RwLock<VisualizationModel>>;

fn read_model(state: &SharedModel) -> VisualizationModel {
    match state.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Hands the accumulated results to map clients over HTTP.
///
/// `GET /payload` returns the whole model, `GET /features` the GeoJSON view.
#[derive(Clone)]
pub struct GuiBridge {
    state: SharedModel,
    default_location: GeoPoint,
    geojson_path: Option<PathBuf>,
}

impl GuiBridge {
    pub fn new(default_location: GeoPoint) -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::new(default_location))),
            default_location,
            geojson_path: None,
        }
    }

    /// Also write the final GeoJSON to `path` when the run finishes.
    pub fn with_geojson_output(mut self, path: Option<PathBuf>) -> Self {
        self.geojson_path = path;
        self
    }

    /// Starts the HTTP endpoint on the current tokio runtime.
    pub fn serve(&self, address: SocketAddr, shutdown: CancellationToken) -> Result<SocketAddr> {
        let state_for_filter = self.state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());

        let payload_route = warp::path("payload")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| warp::reply::json(&read_model(&state)));

        let features_route = warp::path("features")
            .and(warp::get())
            .and(state_filter)
            .map(|state: SharedModel| warp::reply::json(&read_model(&state).features()));

        let routes = payload_route.or(features_route);
        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(address, async move { shutdown.cancelled().await })
            .with_context(|| format!("binding GUI bridge on {}", address))?;
        tokio::spawn(server);

        log::info!("GUI bridge listening on http://{}", bound);
        Ok(bound)
    }

    pub fn publish(&self, model: VisualizationModel) -> TrackingResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| TrackingError::Sink("GUI bridge state poisoned".into()))?;
        log::debug!(
            "[GUI] {} records, center {:.4},{:.4}",
            model.table.len(),
            model.center.latitude,
            model.center.longitude
        );
        *guard = model;
        Ok(())
    }

    pub fn snapshot(&self) -> VisualizationModel {
        read_model(&self.state)
    }

    fn write_geojson(&self, model: &VisualizationModel) -> Result<()> {
        let Some(path) = self.geojson_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&model.features())?;
        fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
        log::info!("map features saved to {}", path.display());
        Ok(())
    }
}

impl ResultSink for GuiBridge {
    fn name(&self) -> &str {
        "gui-bridge"
    }

    fn cycle_completed(
        &mut self,
        report: &CycleReport,
        _appended: &[StoredResult],
        store: &ResultStore,
    ) -> TrackingResult<()> {
        let mut model = VisualizationModel::from_table(store.export(), self.default_location);
        model.last_cycle = Some(report.clone());
        self.publish(model)
    }

    fn run_finished(&mut self, table: &ResultTable, summary: &RunSummary) -> TrackingResult<()> {
        let mut model = VisualizationModel::from_table(table.clone(), self.default_location);
        model.last_cycle = self.snapshot().last_cycle;
        model.summary = Some(summary.clone());
        self.write_geojson(&model)
            .map_err(|err| TrackingError::Sink(format!("{:#}", err)))?;
        self.publish(model)
    }
}
