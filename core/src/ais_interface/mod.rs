pub mod report;
pub mod source;

pub use report::{ObjectReport, ObjectState};
pub use source::{DataSource, ReplaySource};
