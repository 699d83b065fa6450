pub mod geo;
pub mod stats;

pub use geo::{destination, distance, EARTH_RADIUS_KM, KM_PER_NAUTICAL_MILE};
pub use stats::StatsHelper;
