use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};

use crate::db::{ScanRun, ScanStatus, ScanTrigger, UpsertOutcome};
use crate::models::{Period, ScanObservation, ShiftKind};
use crate::vision::Diagnostics;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// State that outlives a single cycle. Owned by the controller behind its
/// single-flight lock.
#[derive(Debug, Default)]
pub struct SessionState {
    diagnostics_cleared: bool,
    cycles_completed: u64,
}

impl SessionState {
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }
}

/// Every date seen for one (month, shift type) during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlyObservationSet {
    pub dates: HashSet<NaiveDate>,
    /// At least one extraction of this band ran to completion, so missing
    /// dates really are gone.
    pub trusted: bool,
}

/// Run context for one scan cycle.
pub struct ScanContext<'s> {
    run_id: String,
    trigger: ScanTrigger,
    started_at: DateTime<Utc>,
    today: NaiveDate,
    months_planned: u32,
    session: &'s mut SessionState,
    months_scanned: u32,
    months_failed: u32,
    new_shifts: u32,
    matched: u32,
    new_open_dates: Vec<NaiveDate>,
    observed: BTreeMap<(Period, ShiftKind), MonthlyObservationSet>,
    errors: Vec<String>,
}

impl<'s> ScanContext<'s> {
    pub fn new(
        run_id: String,
        trigger: ScanTrigger,
        today: NaiveDate,
        months_planned: u32,
        session: &'s mut SessionState,
    ) -> Self {
        Self {
            run_id,
            trigger,
            started_at: Utc::now(),
            today,
            months_planned,
            session,
            months_scanned: 0,
            months_failed: 0,
            new_shifts: 0,
            matched: 0,
            new_open_dates: Vec::new(),
            observed: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn trigger(&self) -> ScanTrigger {
        self.trigger
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Wipe the diagnostics directory the first time any cycle runs in this
    /// process.
    pub fn prepare_diagnostics(&mut self, diagnostics: &Diagnostics) {
        if self.session.diagnostics_cleared {
            return;
        }
        match diagnostics.clear() {
            Ok(0) => {}
            Ok(removed) => log_info!("Cleared {removed} old diagnostic image(s)"),
            Err(err) => log_warn!("Could not clear diagnostics: {err:#}"),
        }
        self.session.diagnostics_cleared = true;
    }

    pub fn record_upsert(&mut self, date: NaiveDate, kind: ShiftKind, outcome: UpsertOutcome) {
        if outcome.is_new_record() {
            self.new_shifts += 1;
        }
        if kind == ShiftKind::Open && outcome == UpsertOutcome::Inserted {
            self.new_open_dates.push(date);
        }
    }

    pub fn record_observation(&mut self, observation: &ScanObservation) {
        for kind in ShiftKind::ALL {
            let set = self
                .observed
                .entry((observation.period, kind))
                .or_default();
            set.dates.extend(observation.dates_of(kind));
            set.trusted |= observation.is_complete(kind);
        }
        self.months_scanned += 1;
    }

    pub fn record_month_failure(&mut self, message: String) {
        self.months_failed += 1;
        self.errors.push(message);
    }

    /// Problems that don't count against a month.
    pub fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn set_matched(&mut self, matched: usize) {
        self.matched = u32::try_from(matched).unwrap_or(u32::MAX);
    }

    /// Open dates inserted this cycle, in the order they were observed.
    pub fn new_open_dates(&self) -> &[NaiveDate] {
        &self.new_open_dates
    }

    pub fn observed(&self) -> impl Iterator<Item = (&(Period, ShiftKind), &MonthlyObservationSet)> {
        self.observed.iter()
    }

    pub fn months_scanned(&self) -> u32 {
        self.months_scanned
    }

    pub fn months_failed(&self) -> u32 {
        self.months_failed
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn status(&self) -> ScanStatus {
        if self.months_scanned == 0 {
            ScanStatus::Failed
        } else if self.months_scanned < self.months_planned || !self.errors.is_empty() {
            ScanStatus::Partial
        } else {
            ScanStatus::Completed
        }
    }

    /// Close the cycle. `fatal` marks the whole run as failed regardless of
    /// how many months got through.
    pub fn finish(self, fatal: Option<String>) -> ScanRun {
        let status = if fatal.is_some() {
            ScanStatus::Failed
        } else {
            self.status()
        };

        let mut errors = self.errors;
        errors.extend(fatal);
        self.session.cycles_completed += 1;

        ScanRun {
            id: self.run_id,
            trigger: self.trigger,
            started_at: self.started_at,
            finished_at: Utc::now(),
            months_scanned: self.months_scanned,
            months_failed: self.months_failed,
            new_shifts: self.new_shifts,
            matched: self.matched,
            status,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }
}
