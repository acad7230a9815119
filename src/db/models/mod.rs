pub mod scan_run;
pub mod shift;

pub use scan_run::{ScanRun, ScanStatus, ScanSummary, ScanTrigger};
pub use shift::ShiftRecord;
