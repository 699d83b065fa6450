pub mod prediction;
pub mod store;
pub mod validation;

pub use prediction::{PredictedPosition, PredictionBatch, PredictionEngine};
pub use store::{DeviationSummary, ResultRow, ResultStore, ResultTable, StoredResult};
pub use validation::{validate, GeoValidator, MatchOutcome, ValidationRecord};
