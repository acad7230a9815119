pub mod availability;
pub mod scan_runs;
pub mod shifts;
