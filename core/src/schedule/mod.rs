pub mod clock;
pub mod controller;
pub mod sink;

pub use clock::{Clock, ManualClock, TokioClock};
pub use controller::{ControllerState, RunSummary, ScheduleController};
pub use sink::{CycleReport, CycleStatus, ResultSink};
