use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vesselcore::ais_interface::{DataSource, ObjectReport};
use vesselcore::math::{destination, KM_PER_NAUTICAL_MILE};
use vesselcore::prelude::{GeoPoint, TrackingResult};

const CATEGORIES: [&str; 5] = ["Cargo", "Tanker", "Passenger", "Fishing", "Tug"];

/// Configuration for the offline vessel generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub vessels: usize,
    pub spread_km: f64,
    pub max_speed_knots: f64,
    /// Upper bound of the random error added to every reported fix.
    pub position_jitter_km: f64,
    pub dropout_rate: f64,
    pub malformed_rate: f64,
    pub seed: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            vessels: 12,
            spread_km: 8.0,
            max_speed_knots: 18.0,
            position_jitter_km: 0.3,
            dropout_rate: 0.05,
            malformed_rate: 0.03,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct SimVessel {
    mmsi: String,
    name: String,
    category: &'static str,
    position: GeoPoint,
    heading: f64,
    speed: f64,
}

/// Synthetic feed of constant-velocity vessels around a centre point.
///
/// Every fetch after the first advances simulated time by `step`.
pub struct SimulatedFleet {
    config: FleetConfig,
    rng: StdRng,
    vessels: Vec<SimVessel>,
    now: DateTime<Utc>,
    step: chrono::Duration,
    fetches: usize,
}

fn offset(from: &GeoPoint, bearing: f64, km: f64) -> TrackingResult<GeoPoint> {
    destination(from, bearing, km / KM_PER_NAUTICAL_MILE, chrono::Duration::hours(1))
}

fn sample(rng: &mut StdRng, upper: f64) -> f64 {
    if upper > 0.0 {
        rng.gen_range(0.0..upper)
    } else {
        0.0
    }
}

impl SimulatedFleet {
    pub fn new(config: FleetConfig, center: GeoPoint, step: Duration) -> anyhow::Result<Self> {
        center.validate()?;
        for (name, rate) in [
            ("dropout_rate", config.dropout_rate),
            ("malformed_rate", config.malformed_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                bail!("{} must lie in [0, 1], got {}", name, rate);
            }
        }
        let step = chrono::Duration::from_std(step)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut vessels = Vec::with_capacity(config.vessels);
        for index in 0..config.vessels {
            let bearing = rng.gen_range(0.0..360.0);
            let range = sample(&mut rng, config.spread_km);
            vessels.push(SimVessel {
                mmsi: format!("{}", 200_000_000 + index as u64 * 7_919),
                name: format!("SIM VESSEL {:02}", index + 1),
                category: CATEGORIES[index % CATEGORIES.len()],
                position: offset(&center, bearing, range)?,
                heading: rng.gen_range(0.0..360.0),
                speed: sample(&mut rng, config.max_speed_knots),
            });
        }

        Ok(Self {
            config,
            rng,
            vessels,
            now: Utc::now(),
            step,
            fetches: 0,
        })
    }

    fn advance(&mut self) -> TrackingResult<()> {
        for vessel in &mut self.vessels {
            vessel.position =
                destination(&vessel.position, vessel.heading, vessel.speed, self.step)?;
        }
        self.now += self.step;
        Ok(())
    }

    fn observe(&mut self, vessel: &SimVessel) -> TrackingResult<Option<ObjectReport>> {
        if self.rng.gen_bool(self.config.dropout_rate) {
            return Ok(None);
        }
        let bearing = self.rng.gen_range(0.0..360.0);
        let error = sample(&mut self.rng, self.config.position_jitter_km);
        let fix = offset(&vessel.position, bearing, error)?;

        let mut report = ObjectReport::new(
            vessel.mmsi.clone(),
            vessel.name.clone(),
            fix.latitude,
            fix.longitude,
            vessel.heading,
            vessel.speed,
            vessel.category,
            self.now,
        );
        if self.rng.gen_bool(self.config.malformed_rate) {
            report.heading = None;
        }
        Ok(Some(report))
    }
}

#[async_trait]
impl DataSource for SimulatedFleet {
    async fn fetch_snapshot(&mut self) -> TrackingResult<Vec<ObjectReport>> {
        if self.fetches > 0 {
            self.advance()?;
        }
        self.fetches += 1;

        let vessels = self.vessels.clone();
        let mut snapshot = Vec::with_capacity(vessels.len());
        for vessel in &vessels {
            if let Some(report) = self.observe(vessel)? {
                snapshot.push(report);
            }
        }
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!(
            "simulated fleet ({} vessels, seed {})",
            self.vessels.len(),
            self.config.seed
        )
    }
}
