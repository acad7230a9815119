use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_i64, to_u32},
    models::{ScanRun, ScanStatus, ScanSummary, ScanTrigger},
};

fn row_to_scan_run(row: &Row) -> Result<ScanRun> {
    let trigger: String = row.get("trigger")?;
    let status: String = row.get("status")?;
    let started_at: String = row.get("started_at")?;
    let finished_at: String = row.get("finished_at")?;

    Ok(ScanRun {
        id: row.get("id")?,
        trigger: ScanTrigger::parse(&trigger)
            .ok_or_else(|| anyhow!("unknown scan trigger {trigger}"))?,
        started_at: parse_datetime(&started_at, "started_at")?,
        finished_at: parse_datetime(&finished_at, "finished_at")?,
        months_scanned: to_u32(row.get("months_scanned")?, "months_scanned")?,
        months_failed: to_u32(row.get("months_failed")?, "months_failed")?,
        new_shifts: to_u32(row.get("new_shifts")?, "new_shifts")?,
        matched: to_u32(row.get("matched")?, "matched")?,
        status: ScanStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown scan status {status}"))?,
        error: row.get("error")?,
    })
}

impl Database {
    pub async fn insert_scan_run(&self, run: &ScanRun) -> Result<()> {
        let record = run.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO scan_runs (id, trigger, started_at, finished_at, months_scanned, months_failed, new_shifts, matched, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.trigger.as_str(),
                    record.started_at.to_rfc3339(),
                    record.finished_at.to_rfc3339(),
                    to_i64(record.months_scanned),
                    to_i64(record.months_failed),
                    to_i64(record.new_shifts),
                    to_i64(record.matched),
                    record.status.as_str(),
                    record.error,
                ],
            )
            .with_context(|| "failed to insert scan run")?;
            Ok(())
        })
        .await
    }

    pub async fn recent_scan_runs(&self, limit: u32) -> Result<Vec<ScanRun>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, trigger, started_at, finished_at, months_scanned, months_failed, new_shifts, matched, status, error
                 FROM scan_runs
                 ORDER BY started_at DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![to_i64(limit)])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(row_to_scan_run(row)?);
            }
            Ok(runs)
        })
        .await
    }

    /// Totals for scans that started on `day` (UTC).
    pub async fn scan_summary_for_day(&self, day: NaiveDate) -> Result<ScanSummary> {
        let start = Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN));
        let end = start + chrono::Duration::days(1);
        self.execute(move |conn| {
            let (scans, failed, new_shifts, matched): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'failed'), 0),
                        COALESCE(SUM(new_shifts), 0),
                        COALESCE(SUM(matched), 0)
                 FROM scan_runs
                 WHERE started_at >= ?1 AND started_at < ?2",
                params![start.to_rfc3339(), end.to_rfc3339()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT error FROM scan_runs
                 WHERE started_at >= ?1 AND started_at < ?2 AND error IS NOT NULL
                 ORDER BY started_at DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![start.to_rfc3339(), end.to_rfc3339()])?;
            let last_error: Option<String> = match rows.next()? {
                Some(row) => row.get(0)?,
                None => None,
            };

            Ok(ScanSummary {
                scans: to_u32(scans, "scans")?,
                failed_scans: to_u32(failed, "failed_scans")?,
                new_shifts: to_u32(new_shifts, "new_shifts")?,
                matched: to_u32(matched, "matched")?,
                last_error,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn run(id: &str, started: &str, status: ScanStatus, new_shifts: u32, error: Option<&str>) -> ScanRun {
        let started_at = parse_datetime(started, "started").unwrap();
        ScanRun {
            id: id.into(),
            trigger: ScanTrigger::Scheduled,
            started_at,
            finished_at: started_at + chrono::Duration::seconds(40),
            months_scanned: 4,
            months_failed: 0,
            new_shifts,
            matched: 1,
            status,
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn summarises_one_day() {
        let (_dir, db) = temp_database();
        db.insert_scan_run(&run("a", "2025-09-01T08:00:00+00:00", ScanStatus::Completed, 2, None))
            .await
            .unwrap();
        db.insert_scan_run(&run("b", "2025-09-01T09:00:00+00:00", ScanStatus::Failed, 0, Some("navigator lost window")))
            .await
            .unwrap();
        db.insert_scan_run(&run("c", "2025-09-02T09:00:00+00:00", ScanStatus::Completed, 5, None))
            .await
            .unwrap();

        let summary = db
            .scan_summary_for_day(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(summary.scans, 2);
        assert_eq!(summary.failed_scans, 1);
        assert_eq!(summary.new_shifts, 2);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.last_error.as_deref(), Some("navigator lost window"));

        let recent = db.recent_scan_runs(1).await.unwrap();
        assert_eq!(recent[0].id, "c");
    }

    #[tokio::test]
    async fn empty_day_is_zeroed() {
        let (_dir, db) = temp_database();
        let summary = db
            .scan_summary_for_day(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(summary, ScanSummary::default());
    }
}
