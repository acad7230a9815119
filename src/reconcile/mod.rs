//! Applies extracted observations to the persisted shift state.
//!
//! One record per date at most: a booking always replaces an opening, an
//! opening never overwrites a booking, and `alerted` survives every update
//! so a date is announced once.

use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::{helpers::format_date, helpers::DATE_FORMAT, Database, UpsertOutcome};
use crate::error::ReconcileError;
use crate::models::{MatchedDate, Period, ShiftKind};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// An empty observation set for a month no more than this many months
    /// after the current one is treated as a failed extraction and pruning
    /// is skipped. Past months always count as near-current.
    pub near_current_months: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            near_current_months: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneOutcome {
    /// Empty set on a near-current month; nothing touched.
    SkippedEmpty,
    Pruned(usize),
}

/// Strict `YYYY-MM-DD` parse. Anything that is not a real calendar date
/// written in canonical form is rejected.
pub fn parse_shift_date(raw: &str) -> Result<NaiveDate, ReconcileError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|date| format_date(*date) == raw)
        .ok_or_else(|| ReconcileError::InvalidDate(raw.to_string()))
}

#[derive(Clone)]
pub struct Reconciler {
    db: Database,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(db: Database, config: ReconcileConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub async fn upsert(
        &self,
        date: NaiveDate,
        kind: ShiftKind,
        count: u32,
    ) -> Result<UpsertOutcome> {
        if count == 0 {
            return Err(ReconcileError::InvalidCount.into());
        }

        let outcome = self.db.upsert_shift(date, kind, count).await?;
        match outcome {
            UpsertOutcome::ReplacedOpen => {
                log_info!("Booked shift on {date} replaced a recorded opening");
            }
            UpsertOutcome::RejectedBooked => {
                log::debug!("Ignoring open shift on {date}: already booked");
            }
            UpsertOutcome::Inserted | UpsertOutcome::Updated => {}
        }
        Ok(outcome)
    }

    /// Upsert from an untrusted date string.
    pub async fn upsert_raw(
        &self,
        raw_date: &str,
        kind: ShiftKind,
        count: u32,
    ) -> Result<UpsertOutcome> {
        let date = parse_shift_date(raw_date).map_err(|err| {
            log_warn!("Rejected {} shift: {err}", kind.as_str());
            err
        })?;
        self.upsert(date, kind, count).await
    }

    pub fn is_near_current(&self, period: Period, today: NaiveDate) -> bool {
        period.months_since(Period::containing(today)) <= self.config.near_current_months as i32
    }

    /// Remove `kind` records in `period` that were not observed this cycle.
    pub async fn prune_stale(
        &self,
        period: Period,
        kind: ShiftKind,
        observed: &HashSet<NaiveDate>,
        today: NaiveDate,
    ) -> Result<PruneOutcome> {
        if observed.is_empty() && self.is_near_current(period, today) {
            log_info!(
                "[safety] No {} shifts observed for {period}; skipping cleanup",
                kind.as_str()
            );
            return Ok(PruneOutcome::SkippedEmpty);
        }

        let removed = self
            .db
            .prune_shifts_not_in(period, kind, observed.iter().copied().collect())
            .await?;
        if !removed.is_empty() {
            let listed: Vec<String> = removed.iter().map(|d| format_date(*d)).collect();
            log_info!(
                "Removed {} stale {} shift(s) in {period}: {}",
                removed.len(),
                kind.as_str(),
                listed.join(", ")
            );
        }
        Ok(PruneOutcome::Pruned(removed.len()))
    }

    /// Dates from `newly_added_open` that should be announced, in the
    /// order they were observed.
    pub async fn compute_matches(&self, newly_added_open: &[NaiveDate]) -> Result<Vec<MatchedDate>> {
        let mut seen = HashSet::new();
        let ordered: Vec<NaiveDate> = newly_added_open
            .iter()
            .copied()
            .filter(|date| seen.insert(*date))
            .collect();
        if ordered.is_empty() {
            return Ok(Vec::new());
        }
        self.db.pending_matches(ordered).await
    }

    pub async fn mark_alerted(&self, dates: &[NaiveDate]) -> Result<usize> {
        if dates.is_empty() {
            return Ok(0);
        }
        self.db.mark_shifts_alerted(dates.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn date_validation() {
        assert_eq!(parse_shift_date("2025-09-18"), Ok(d(2025, 9, 18)));
        assert_eq!(parse_shift_date("2024-02-29"), Ok(d(2024, 2, 29)));
        for bad in ["2025-02-30", "2025-13-01", "2025-9-1", "18/09/2025", "", "2025-09-18x"] {
            assert_eq!(
                parse_shift_date(bad),
                Err(ReconcileError::InvalidDate(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_storage() {
        let (_dir, db) = temp_database();
        let reconciler = Reconciler::new(db.clone(), ReconcileConfig::default());

        let err = reconciler
            .upsert_raw("2025-02-30", ShiftKind::Open, 1)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReconcileError>(),
            Some(&ReconcileError::InvalidDate("2025-02-30".into()))
        );

        let err = reconciler
            .upsert(d(2025, 9, 1), ShiftKind::Open, 0)
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<ReconcileError>(), Some(&ReconcileError::InvalidCount));
        assert!(db
            .shifts_for_month(Period::new(2025, 9).unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn near_current_threshold_is_configurable() {
        let (_dir, db) = temp_database();
        let today = d(2025, 9, 15);
        let strict = Reconciler::new(db.clone(), ReconcileConfig { near_current_months: 0 });
        let loose = Reconciler::new(db, ReconcileConfig { near_current_months: 2 });
        let october = Period::new(2025, 10).unwrap();

        assert!(strict.is_near_current(Period::new(2025, 9).unwrap(), today));
        assert!(strict.is_near_current(Period::new(2025, 8).unwrap(), today));
        assert!(!strict.is_near_current(october, today));
        assert!(loose.is_near_current(Period::new(2025, 11).unwrap(), today));
        assert!(!loose.is_near_current(Period::new(2025, 12).unwrap(), today));
    }

    #[tokio::test]
    async fn empty_prune_boundaries() {
        let (_dir, db) = temp_database();
        let reconciler = Reconciler::new(db.clone(), ReconcileConfig::default());
        let today = d(2025, 9, 15);
        for (month, day) in [(9, 3), (10, 3), (11, 3)] {
            reconciler.upsert(d(2025, month, day), ShiftKind::Open, 1).await.unwrap();
        }

        let empty = HashSet::new();
        for month in [9, 10] {
            assert_eq!(
                reconciler
                    .prune_stale(Period::new(2025, month).unwrap(), ShiftKind::Open, &empty, today)
                    .await
                    .unwrap(),
                PruneOutcome::SkippedEmpty
            );
        }
        assert_eq!(
            reconciler
                .prune_stale(Period::new(2025, 11).unwrap(), ShiftKind::Open, &empty, today)
                .await
                .unwrap(),
            PruneOutcome::Pruned(1)
        );
        assert!(db.shift_for_date(d(2025, 9, 3)).await.unwrap().is_some());
        assert!(db.shift_for_date(d(2025, 10, 3)).await.unwrap().is_some());
        assert!(db.shift_for_date(d(2025, 11, 3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn matches_follow_observation_order() {
        let (_dir, db) = temp_database();
        let reconciler = Reconciler::new(db.clone(), ReconcileConfig::default());
        for day in [20, 12, 25, 14] {
            reconciler.upsert(d(2025, 9, day), ShiftKind::Open, 1).await.unwrap();
            db.set_availability(d(2025, 9, day), true).await.unwrap();
        }
        // unavailable
        reconciler.upsert(d(2025, 9, 22), ShiftKind::Open, 1).await.unwrap();

        let dates = [d(2025, 9, 20), d(2025, 9, 22), d(2025, 9, 12), d(2025, 9, 20), d(2025, 9, 25)];
        let matched: Vec<_> = reconciler
            .compute_matches(&dates)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.date)
            .collect();
        assert_eq!(matched, vec![d(2025, 9, 20), d(2025, 9, 12), d(2025, 9, 25)]);
    }
}
