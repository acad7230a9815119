use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{format_date, parse_date},
};
use crate::models::Period;

impl Database {
    /// Availability is stored as presence: a row means the user can work
    /// that day.
    pub async fn set_availability(&self, date: NaiveDate, available: bool) -> Result<()> {
        let date_str = format_date(date);
        self.execute(move |conn| {
            if available {
                conn.execute(
                    "INSERT OR IGNORE INTO availability (date) VALUES (?1)",
                    params![date_str],
                )
            } else {
                conn.execute("DELETE FROM availability WHERE date = ?1", params![date_str])
            }
            .with_context(|| format!("failed to update availability for {date_str}"))?;
            Ok(())
        })
        .await
    }

    pub async fn is_available(&self, date: NaiveDate) -> Result<bool> {
        self.execute(move |conn| {
            let found: i64 = conn.query_row(
                "SELECT COUNT(*) FROM availability WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )?;
            Ok(found > 0)
        })
        .await
    }

    pub async fn availability_for_month(&self, period: Period) -> Result<Vec<NaiveDate>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date FROM availability
                 WHERE date >= ?1 AND date < ?2
                 ORDER BY date ASC",
            )?;
            let mut rows = stmt.query(params![
                format_date(period.start()),
                format_date(period.end_exclusive()),
            ])?;

            let mut dates = Vec::new();
            while let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                dates.push(parse_date(&raw, "availability date")?);
            }
            Ok(dates)
        })
        .await
    }
}
