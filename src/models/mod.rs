pub mod observation;
pub mod period;
pub mod shift;

pub use observation::ScanObservation;
pub use period::Period;
pub use shift::{MatchedDate, ObservedShift, ShiftKind};
