use super::dates::DateCounts;
use crate::models::{ObservedShift, Period, ScanObservation, ShiftKind};

/// Union of the open and booked passes. A date present in both ends up
/// booked with the booked count; counts are never summed across types.
pub fn build_observation(
    period: Period,
    open: &DateCounts,
    booked: &DateCounts,
    open_complete: bool,
    booked_complete: bool,
) -> ScanObservation {
    let mut observation = ScanObservation::new(period);
    observation.open_complete = open_complete;
    observation.booked_complete = booked_complete;

    for (date, count) in open.iter() {
        observation.insert(date, ObservedShift { kind: ShiftKind::Open, count });
    }
    for (date, count) in booked.iter() {
        observation.insert(date, ObservedShift { kind: ShiftKind::Booked, count });
    }
    observation
}
