use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use vesselcore::ais_interface::ObjectReport;

/// One vessel row as the position provider returns it. Numbers arrive either
/// as JSON numbers or as strings, and any column may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct ProviderRow {
    pub mmsi: Value,
    pub name: Value,
    pub latitude: Value,
    pub longitude: Value,
    pub cog: Value,
    pub sog: Value,
    pub vessel_type: Value,
}

/// Provider responses come either row-wise or column-wise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderPayload {
    Rows(Vec<ProviderRow>),
    Columns(HashMap<String, Vec<Value>>),
}

impl ProviderRow {
    /// `None` when the row carries no usable identifier.
    pub fn to_report(&self, observed_at: DateTime<Utc>) -> Option<ObjectReport> {
        let identifier = text(&self.mmsi);
        if identifier.is_empty() {
            return None;
        }
        Some(ObjectReport {
            identifier,
            name: text(&self.name),
            latitude: number(&self.latitude),
            longitude: number(&self.longitude),
            heading: number(&self.cog),
            speed: number(&self.sog),
            category: text(&self.vessel_type),
            observed_at,
        })
    }
}

impl ProviderPayload {
    pub fn into_rows(self) -> Vec<ProviderRow> {
        match self {
            ProviderPayload::Rows(rows) => rows,
            ProviderPayload::Columns(mut columns) => {
                let len = columns.values().map(Vec::len).max().unwrap_or(0);
                let mut take = |key: &str| {
                    let mut column = columns.remove(key).unwrap_or_default();
                    column.resize(len, Value::Null);
                    column
                };
                let mmsi = take("MMSI");
                let name = take("NAME");
                let latitude = take("LATITUDE");
                let longitude = take("LONGITUDE");
                let cog = take("COG");
                let sog = take("SOG");
                let vessel_type = take("VESSEL_TYPE");

                (0..len)
                    .map(|i| ProviderRow {
                        mmsi: mmsi[i].clone(),
                        name: name[i].clone(),
                        latitude: latitude[i].clone(),
                        longitude: longitude[i].clone(),
                        cog: cog[i].clone(),
                        sog: sog[i].clone(),
                        vessel_type: vessel_type[i].clone(),
                    })
                    .collect()
            }
        }
    }

    /// Converts the payload, returning the reports and the number of rows
    /// dropped for lacking an identifier.
    pub fn into_reports(self, observed_at: DateTime<Utc>) -> (Vec<ObjectReport>, usize) {
        let rows = self.into_rows();
        let total = rows.len();
        let reports: Vec<ObjectReport> = rows
            .iter()
            .filter_map(|row| row.to_report(observed_at))
            .collect();
        let dropped = total - reports.len();
        (reports, dropped)
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
