use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_date, parse_date, parse_datetime, parse_kind, to_i64, to_u32},
    models::ShiftRecord,
};
use crate::models::{MatchedDate, Period, ShiftKind};

const SHIFT_COLUMNS: &str = "id, date, shift_type, count, alerted, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Existing record of the same type; count refreshed, `alerted` kept.
    Updated,
    /// Booked record inserted after deleting the open record for that date.
    ReplacedOpen,
    /// Open upsert ignored because the date is already booked.
    RejectedBooked,
}

impl UpsertOutcome {
    pub fn is_new_record(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted | UpsertOutcome::ReplacedOpen)
    }
}

fn row_to_shift(row: &Row) -> Result<ShiftRecord> {
    let date: String = row.get("date")?;
    let kind: String = row.get("shift_type")?;
    let created_at: String = row.get("created_at")?;

    Ok(ShiftRecord {
        id: row.get("id")?,
        date: parse_date(&date, "date")?,
        kind: parse_kind(&kind)?,
        count: to_u32(row.get("count")?, "count")?,
        alerted: row.get::<_, i64>("alerted")? != 0,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Insert or refresh the record for `date`, keeping at most one of
    /// open/booked per date. Runs as a single transaction.
    pub async fn upsert_shift(
        &self,
        date: NaiveDate,
        kind: ShiftKind,
        count: u32,
    ) -> Result<UpsertOutcome> {
        let date_str = format_date(date);
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open upsert transaction")?;

            let mut replaced_open = false;
            match kind {
                ShiftKind::Booked => {
                    let removed = tx.execute(
                        "DELETE FROM shifts WHERE date = ?1 AND shift_type = 'open'",
                        params![date_str],
                    )?;
                    replaced_open = removed > 0;
                }
                ShiftKind::Open => {
                    let booked: Option<i64> = tx
                        .query_row(
                            "SELECT id FROM shifts WHERE date = ?1 AND shift_type = 'booked'",
                            params![date_str],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if booked.is_some() {
                        return Ok(UpsertOutcome::RejectedBooked);
                    }
                }
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM shifts WHERE date = ?1 AND shift_type = ?2",
                    params![date_str, kind.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let outcome = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE shifts SET count = ?1 WHERE id = ?2",
                        params![to_i64(count), id],
                    )?;
                    UpsertOutcome::Updated
                }
                None => {
                    tx.execute(
                        "INSERT INTO shifts (date, shift_type, count, alerted, created_at)
                         VALUES (?1, ?2, ?3, 0, ?4)",
                        params![date_str, kind.as_str(), to_i64(count), Utc::now().to_rfc3339()],
                    )
                    .with_context(|| format!("failed to insert {} shift {date_str}", kind.as_str()))?;
                    if replaced_open {
                        UpsertOutcome::ReplacedOpen
                    } else {
                        UpsertOutcome::Inserted
                    }
                }
            };

            tx.commit().context("failed to commit upsert")?;
            Ok(outcome)
        })
        .await
    }

    /// Delete every `kind` record inside `period` whose date is not in
    /// `keep`. Returns the deleted dates.
    pub async fn prune_shifts_not_in(
        &self,
        period: Period,
        kind: ShiftKind,
        keep: Vec<NaiveDate>,
    ) -> Result<Vec<NaiveDate>> {
        let keep: HashSet<NaiveDate> = keep.into_iter().collect();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open prune transaction")?;

            let stored = {
                let mut stmt = tx.prepare(
                    "SELECT date FROM shifts
                     WHERE shift_type = ?1 AND date >= ?2 AND date < ?3
                     ORDER BY date ASC",
                )?;
                let mut rows = stmt.query(params![
                    kind.as_str(),
                    format_date(period.start()),
                    format_date(period.end_exclusive()),
                ])?;
                let mut dates = Vec::new();
                while let Some(row) = rows.next()? {
                    let raw: String = row.get(0)?;
                    dates.push(parse_date(&raw, "date")?);
                }
                dates
            };

            let mut removed = Vec::new();
            for date in stored.into_iter().filter(|date| !keep.contains(date)) {
                tx.execute(
                    "DELETE FROM shifts WHERE date = ?1 AND shift_type = ?2",
                    params![format_date(date), kind.as_str()],
                )?;
                removed.push(date);
            }

            tx.commit().context("failed to commit prune")?;
            Ok(removed)
        })
        .await
    }

    /// Flag open records as alerted. Already-alerted rows are left alone,
    /// so the return value counts only rows that actually changed.
    pub async fn mark_shifts_alerted(&self, dates: Vec<NaiveDate>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for date in dates {
                changed += tx.execute(
                    "UPDATE shifts SET alerted = 1
                     WHERE date = ?1 AND shift_type = 'open' AND alerted = 0",
                    params![format_date(date)],
                )?;
            }
            tx.commit().context("failed to commit alerted flags")?;
            Ok(changed)
        })
        .await
    }

    /// Filters `dates`, in the given order, down to open records that are
    /// unalerted, not booked and marked available.
    pub async fn pending_matches(&self, dates: Vec<NaiveDate>) -> Result<Vec<MatchedDate>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.count FROM shifts s
                 JOIN availability a ON a.date = s.date
                 WHERE s.date = ?1
                   AND s.shift_type = 'open'
                   AND s.alerted = 0
                   AND NOT EXISTS (
                       SELECT 1 FROM shifts b WHERE b.date = s.date AND b.shift_type = 'booked'
                   )",
            )?;

            let mut matches = Vec::new();
            for date in dates {
                let count: Option<i64> = stmt
                    .query_row(params![format_date(date)], |row| row.get(0))
                    .optional()?;
                if let Some(count) = count {
                    matches.push(MatchedDate {
                        date,
                        count: to_u32(count, "count")?,
                    });
                }
            }
            Ok(matches)
        })
        .await
    }

    pub async fn shift_for_date(&self, date: NaiveDate) -> Result<Option<ShiftRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SHIFT_COLUMNS} FROM shifts
                 WHERE date = ?1
                 ORDER BY shift_type = 'booked' DESC
                 LIMIT 1"
            ))?;
            let mut rows = stmt.query(params![format_date(date)])?;
            let record = match rows.next()? {
                Some(row) => Some(row_to_shift(row)?),
                None => None,
            };
            Ok(record)
        })
        .await
    }

    pub async fn shifts_for_month(&self, period: Period) -> Result<Vec<ShiftRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SHIFT_COLUMNS} FROM shifts
                 WHERE date >= ?1 AND date < ?2
                 ORDER BY date ASC, shift_type ASC"
            ))?;
            let mut rows = stmt.query(params![
                format_date(period.start()),
                format_date(period.end_exclusive()),
            ])?;

            let mut shifts = Vec::new();
            while let Some(row) = rows.next()? {
                shifts.push(row_to_shift(row)?);
            }
            Ok(shifts)
        })
        .await
    }

    /// Drop records dated before `today`.
    pub async fn remove_past_shifts(&self, today: NaiveDate) -> Result<usize> {
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM shifts WHERE date < ?1",
                params![format_date(today)],
            )
            .context("failed to remove past shifts")
        })
        .await
    }

    pub async fn clear_all_shifts(&self) -> Result<usize> {
        self.execute(|conn| {
            conn.execute("DELETE FROM shifts", [])
                .context("failed to clear shifts")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    async fn count_rows(db: &Database, date: NaiveDate) -> i64 {
        db.execute(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM shifts WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn booked_replaces_open() {
        let (_dir, db) = temp_database();
        assert_eq!(
            db.upsert_shift(d(9, 18), ShiftKind::Open, 1).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            db.upsert_shift(d(9, 18), ShiftKind::Booked, 1).await.unwrap(),
            UpsertOutcome::ReplacedOpen
        );

        let record = db.shift_for_date(d(9, 18)).await.unwrap().unwrap();
        assert_eq!(record.kind, ShiftKind::Booked);
        assert_eq!(record.count, 1);
        assert_eq!(count_rows(&db, d(9, 18)).await, 1);
    }

    #[tokio::test]
    async fn open_is_rejected_on_booked_date() {
        let (_dir, db) = temp_database();
        db.upsert_shift(d(9, 3), ShiftKind::Booked, 2).await.unwrap();
        assert_eq!(
            db.upsert_shift(d(9, 3), ShiftKind::Open, 5).await.unwrap(),
            UpsertOutcome::RejectedBooked
        );

        let record = db.shift_for_date(d(9, 3)).await.unwrap().unwrap();
        assert_eq!(record.kind, ShiftKind::Booked);
        assert_eq!(record.count, 2);
        assert_eq!(count_rows(&db, d(9, 3)).await, 1);
    }

    #[tokio::test]
    async fn update_keeps_alerted_flag() {
        let (_dir, db) = temp_database();
        db.upsert_shift(d(9, 4), ShiftKind::Open, 1).await.unwrap();
        assert_eq!(db.mark_shifts_alerted(vec![d(9, 4)]).await.unwrap(), 1);

        assert_eq!(
            db.upsert_shift(d(9, 4), ShiftKind::Open, 3).await.unwrap(),
            UpsertOutcome::Updated
        );
        let record = db.shift_for_date(d(9, 4)).await.unwrap().unwrap();
        assert!(record.alerted);
        assert_eq!(record.count, 3);
    }

    #[tokio::test]
    async fn mark_alerted_only_counts_changes() {
        let (_dir, db) = temp_database();
        db.upsert_shift(d(9, 4), ShiftKind::Open, 1).await.unwrap();
        db.upsert_shift(d(9, 5), ShiftKind::Booked, 1).await.unwrap();

        assert_eq!(db.mark_shifts_alerted(vec![d(9, 4), d(9, 5)]).await.unwrap(), 1);
        assert_eq!(db.mark_shifts_alerted(vec![d(9, 4)]).await.unwrap(), 0);
        assert!(!db.shift_for_date(d(9, 5)).await.unwrap().unwrap().alerted);
    }

    #[tokio::test]
    async fn prune_is_scoped_to_month_and_type() {
        let (_dir, db) = temp_database();
        for day in [7, 12, 19] {
            db.upsert_shift(d(9, day), ShiftKind::Open, 1).await.unwrap();
        }
        db.upsert_shift(d(9, 25), ShiftKind::Booked, 1).await.unwrap();
        db.upsert_shift(d(10, 1), ShiftKind::Open, 1).await.unwrap();

        let period = Period::new(2025, 9).unwrap();
        let removed = db
            .prune_shifts_not_in(period, ShiftKind::Open, vec![d(9, 7), d(9, 19)])
            .await
            .unwrap();
        assert_eq!(removed, vec![d(9, 12)]);

        let remaining: Vec<_> = db
            .shifts_for_month(period)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.date, r.kind))
            .collect();
        assert_eq!(
            remaining,
            vec![
                (d(9, 7), ShiftKind::Open),
                (d(9, 19), ShiftKind::Open),
                (d(9, 25), ShiftKind::Booked),
            ]
        );
        assert!(db.shift_for_date(d(10, 1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn past_and_clear() {
        let (_dir, db) = temp_database();
        db.upsert_shift(d(8, 30), ShiftKind::Open, 1).await.unwrap();
        db.upsert_shift(d(9, 2), ShiftKind::Booked, 1).await.unwrap();

        assert_eq!(db.remove_past_shifts(d(9, 1)).await.unwrap(), 1);
        assert!(db.shift_for_date(d(8, 30)).await.unwrap().is_none());
        assert_eq!(db.clear_all_shifts().await.unwrap(), 1);
    }
}
