use chrono::NaiveDate;

use super::{ObservedShift, Period, ShiftKind};

/// Everything extracted from one screenshot. Entries keep the order in
/// which dates were first seen; re-inserting a date replaces its value
/// without moving it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanObservation {
    pub period: Period,
    entries: Vec<(NaiveDate, ObservedShift)>,
    pub open_complete: bool,
    pub booked_complete: bool,
}

impl ScanObservation {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            entries: Vec::new(),
            open_complete: false,
            booked_complete: false,
        }
    }

    /// Returns the previous entry for `date`, if any.
    pub fn insert(&mut self, date: NaiveDate, shift: ObservedShift) -> Option<ObservedShift> {
        match self.entries.iter_mut().find(|(existing, _)| *existing == date) {
            Some((_, slot)) => Some(std::mem::replace(slot, shift)),
            None => {
                self.entries.push((date, shift));
                None
            }
        }
    }

    pub fn get(&self, date: NaiveDate) -> Option<&ObservedShift> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == date)
            .map(|(_, shift)| shift)
    }

    pub fn entries(&self) -> &[(NaiveDate, ObservedShift)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dates_of(&self, kind: ShiftKind) -> Vec<NaiveDate> {
        self.entries
            .iter()
            .filter(|(_, shift)| shift.kind == kind)
            .map(|(date, _)| *date)
            .collect()
    }

    /// Whether the `kind` pass can be trusted as the full set of that kind
    /// for this month: the band was located and no column was dropped.
    pub fn is_complete(&self, kind: ShiftKind) -> bool {
        match kind {
            ShiftKind::Open => self.open_complete,
            ShiftKind::Booked => self.booked_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut obs = ScanObservation::new(Period::new(2025, 9).unwrap());
        let open = ObservedShift { kind: ShiftKind::Open, count: 2 };
        let booked = ObservedShift { kind: ShiftKind::Booked, count: 1 };

        assert_eq!(obs.insert(date(5), open), None);
        obs.insert(date(9), open);
        assert_eq!(obs.insert(date(5), booked), Some(open));

        assert_eq!(obs.len(), 2);
        assert_eq!(obs.entries()[0], (date(5), booked));
        assert_eq!(obs.dates_of(ShiftKind::Open), vec![date(9)]);
        assert_eq!(obs.dates_of(ShiftKind::Booked), vec![date(5)]);
    }
}
