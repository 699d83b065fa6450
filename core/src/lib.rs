//! Dead-reckoning prediction and validation core for vessel position feeds.
//!
//! Snapshots of position reports are extrapolated along great circles,
//! checked against the next snapshot, and accumulated cycle by cycle under
//! an explicit schedule state machine.

pub mod ais_interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod schedule;
pub mod telemetry;

pub use prelude::{GeoPoint, ScheduleConfig, TrackingError, TrackingResult};
