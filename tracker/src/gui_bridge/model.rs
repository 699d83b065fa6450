use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vesselcore::prelude::GeoPoint;
use vesselcore::processing::ResultTable;
use vesselcore::schedule::{CycleReport, RunSummary};

/// State exposed to map clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationModel {
    /// Map centre: mean vessel position, or the configured default location.
    pub center: GeoPoint,
    pub table: ResultTable,
    pub last_cycle: Option<CycleReport>,
    pub summary: Option<RunSummary>,
}

impl VisualizationModel {
    pub fn new(default_location: GeoPoint) -> Self {
        Self {
            center: default_location,
            table: ResultTable::default(),
            last_cycle: None,
            summary: None,
        }
    }

    pub fn from_table(table: ResultTable, default_location: GeoPoint) -> Self {
        Self {
            center: table.center().unwrap_or(default_location),
            table,
            last_cycle: None,
            summary: None,
        }
    }

    /// GeoJSON with a marker per record and a track line to its prediction.
    pub fn features(&self) -> Value {
        let mut features = Vec::with_capacity(self.table.len() * 2);
        for row in self.table.rows() {
            let color = if row.within_tolerance { "green" } else { "orange" };
            features.push(json!({
                "type": "Feature",
                "properties": {
                    "identifier": row.identifier,
                    "name": row.name,
                    "vessel_type": row.category,
                    "cycle": row.cycle,
                    "within_radius": if row.within_tolerance { "Yes" } else { "No" },
                    "distance_km": row.distance_km,
                    "actual": [row.actual_longitude, row.actual_latitude],
                    "color": color,
                },
                "geometry": {
                    "type": "Point",
                    "coordinates": [row.longitude, row.latitude],
                },
            }));
            features.push(json!({
                "type": "Feature",
                "properties": {
                    "identifier": row.identifier,
                    "cycle": row.cycle,
                    "color": color,
                },
                "geometry": {
                    "type": "LineString",
                    "coordinates": [
                        [row.longitude, row.latitude],
                        [row.predicted_longitude, row.predicted_latitude],
                    ],
                },
            }));
        }

        json!({
            "type": "FeatureCollection",
            "center": [self.center.longitude, self.center.latitude],
            "features": features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_model_centres_on_default_location() {
        let home = GeoPoint::new(51.9, 4.1);
        let model = VisualizationModel::from_table(ResultTable::default(), home);
        assert_eq!(model.center, home);
        let features = model.features();
        assert_eq!(features["type"], "FeatureCollection");
        assert_eq!(features["features"].as_array().unwrap().len(), 0);
        assert_eq!(features["center"][0], 4.1);
    }
}
