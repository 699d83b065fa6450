use crate::math::stats::StatsHelper;
use crate::prelude::{GeoPoint, TrackingError, TrackingResult};
use crate::processing::validation::ValidationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One validated (object, cycle) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub cycle: usize,
    pub record: ValidationRecord,
}

/// Append-only accumulation of validation results across cycles.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: Vec<StoredResult>,
    keys: HashSet<(String, usize)>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, cycle: usize, record: ValidationRecord) -> TrackingResult<()> {
        let key = (record.identifier().to_string(), cycle);
        if self.keys.contains(&key) {
            return Err(TrackingError::DuplicateRecord {
                identifier: key.0,
                cycle,
            });
        }
        self.keys.insert(key);
        self.entries.push(StoredResult { cycle, record });
        Ok(())
    }

    /// Appends a whole cycle; nothing is stored if any key collides.
    pub fn append_cycle(
        &mut self,
        cycle: usize,
        records: Vec<ValidationRecord>,
    ) -> TrackingResult<usize> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            let identifier = record.identifier();
            if !seen.insert(identifier)
                || self.keys.contains(&(identifier.to_string(), cycle))
            {
                return Err(TrackingError::DuplicateRecord {
                    identifier: identifier.to_string(),
                    cycle,
                });
            }
        }

        let appended = records.len();
        for record in records {
            self.append(cycle, record)?;
        }
        Ok(appended)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StoredResult] {
        &self.entries
    }

    /// Entries appended after the first `offset` ones.
    pub fn entries_since(&self, offset: usize) -> &[StoredResult] {
        &self.entries[offset.min(self.entries.len())..]
    }

    pub fn history<'a>(&'a self, identifier: &'a str) -> impl Iterator<Item = &'a StoredResult> {
        self.entries
            .iter()
            .filter(move |entry| entry.record.identifier() == identifier)
    }

    pub fn export(&self) -> ResultTable {
        ResultTable::from_entries(&self.entries)
    }

    pub fn deviation_summary(&self) -> DeviationSummary {
        let distances: Vec<f64> = self
            .entries
            .iter()
            .map(|entry| entry.record.distance_km)
            .collect();
        DeviationSummary {
            records: distances.len(),
            within_tolerance: self
                .entries
                .iter()
                .filter(|entry| entry.record.within_tolerance)
                .count(),
            mean_km: StatsHelper::mean(&distances),
            rms_km: StatsHelper::rms(&distances),
            max_km: StatsHelper::max(&distances),
        }
    }
}

/// Aggregate of prediction deviations over every stored record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviationSummary {
    pub records: usize,
    pub within_tolerance: usize,
    pub mean_km: f64,
    pub rms_km: f64,
    pub max_km: f64,
}

/// Flat view of one stored result, used for row-oriented writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub cycle: usize,
    pub identifier: String,
    pub name: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: f64,
    pub observed_at: DateTime<Utc>,
    pub predicted_latitude: f64,
    pub predicted_longitude: f64,
    pub predicted_at: DateTime<Utc>,
    pub actual_latitude: f64,
    pub actual_longitude: f64,
    pub actual_observed_at: DateTime<Utc>,
    pub distance_km: f64,
    pub within_tolerance: bool,
}

/// Columnar export of the store, one vector per column in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub cycle: Vec<usize>,
    pub identifier: Vec<String>,
    pub name: Vec<String>,
    pub category: Vec<String>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub heading: Vec<f64>,
    pub speed: Vec<f64>,
    pub observed_at: Vec<DateTime<Utc>>,
    pub predicted_latitude: Vec<f64>,
    pub predicted_longitude: Vec<f64>,
    pub predicted_at: Vec<DateTime<Utc>>,
    pub actual_latitude: Vec<f64>,
    pub actual_longitude: Vec<f64>,
    pub actual_observed_at: Vec<DateTime<Utc>>,
    pub distance_km: Vec<f64>,
    pub within_tolerance: Vec<bool>,
}

impl ResultTable {
    pub fn from_entries(entries: &[StoredResult]) -> Self {
        let mut table = ResultTable::default();
        for entry in entries {
            let record = &entry.record;
            let origin = &record.predicted.origin;
            table.cycle.push(entry.cycle);
            table.identifier.push(origin.identifier.clone());
            table.name.push(origin.name.clone());
            table.category.push(origin.category.clone());
            table.latitude.push(origin.position.latitude);
            table.longitude.push(origin.position.longitude);
            table.heading.push(origin.heading_deg);
            table.speed.push(origin.speed_knots);
            table.observed_at.push(origin.observed_at);
            table.predicted_latitude.push(record.predicted.position.latitude);
            table.predicted_longitude.push(record.predicted.position.longitude);
            table.predicted_at.push(record.predicted.predicted_at);
            table.actual_latitude.push(record.actual.latitude);
            table.actual_longitude.push(record.actual.longitude);
            table.actual_observed_at.push(record.actual_observed_at);
            table.distance_km.push(record.distance_km);
            table.within_tolerance.push(record.within_tolerance);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<ResultRow> {
        if index >= self.len() {
            return None;
        }
        Some(ResultRow {
            cycle: self.cycle[index],
            identifier: self.identifier[index].clone(),
            name: self.name[index].clone(),
            category: self.category[index].clone(),
            latitude: self.latitude[index],
            longitude: self.longitude[index],
            heading: self.heading[index],
            speed: self.speed[index],
            observed_at: self.observed_at[index],
            predicted_latitude: self.predicted_latitude[index],
            predicted_longitude: self.predicted_longitude[index],
            predicted_at: self.predicted_at[index],
            actual_latitude: self.actual_latitude[index],
            actual_longitude: self.actual_longitude[index],
            actual_observed_at: self.actual_observed_at[index],
            distance_km: self.distance_km[index],
            within_tolerance: self.within_tolerance[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ResultRow> + '_ {
        (0..self.len()).filter_map(move |index| self.row(index))
    }

    /// Mean original position, or `None` for an empty table. Longitudes are
    /// averaged on the circle.
    pub fn center(&self) -> Option<GeoPoint> {
        if self.is_empty() {
            return None;
        }
        Some(GeoPoint::new(
            StatsHelper::mean(&self.latitude),
            StatsHelper::circular_mean_deg(&self.longitude),
        ))
    }
}
