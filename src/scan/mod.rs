//! Scan-cycle orchestration around the extractor and the reconciler.

mod context;
mod controller;
mod cycle;
mod loop_worker;
mod source;

pub use context::{MonthlyObservationSet, ScanContext, SessionState};
pub use controller::{Admission, ScanController, ScanReport, ScanScheduler};
pub use cycle::{CycleOutcome, ScanServices};
pub use source::{CalendarNavigator, DirectoryNavigator};
