use crate::feed::provider::ProviderPayload;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use vesselcore::ais_interface::{DataSource, ObjectReport};
use vesselcore::prelude::{GeoPoint, TrackingError, TrackingResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls the position provider with a form-encoded area query.
pub struct HttpDataSource {
    client: reqwest::Client,
    endpoint: String,
    center: GeoPoint,
    search_radius: f64,
}

impl HttpDataSource {
    pub fn new(endpoint: &str, center: GeoPoint, search_radius: f64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client for the position provider")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            center,
            search_radius,
        })
    }
}

fn unavailable(err: impl std::fmt::Display) -> TrackingError {
    TrackingError::SourceUnavailable(err.to_string())
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch_snapshot(&mut self) -> TrackingResult<Vec<ObjectReport>> {
        let form = [
            ("lat", self.center.latitude.to_string()),
            ("lon", self.center.longitude.to_string()),
            ("radius", self.search_radius.to_string()),
        ];
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("{}: {}", status, body.trim())));
        }

        let payload: ProviderPayload = response.json().await.map_err(unavailable)?;
        let (reports, dropped) = payload.into_reports(Utc::now());
        if dropped > 0 {
            log::warn!("provider returned {} rows without an MMSI", dropped);
        }
        log::debug!("fetched {} reports from {}", reports.len(), self.endpoint);
        Ok(reports)
    }

    fn describe(&self) -> String {
        format!(
            "{} (center {:.4},{:.4}, radius {})",
            self.endpoint, self.center.latitude, self.center.longitude, self.search_radius
        )
    }
}
