//! Outbound notification collaborator. Delivery is someone else's job; the
//! scan cycle only hands over one batch per cycle and marks the dates as
//! alerted once `notify` returns `Ok`.

mod message;

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::ScanSummary;
use crate::models::MatchedDate;

pub use message::{format_daily_summary, format_match_list, format_match_message, short_date};

pub trait Notifier: Send + Sync {
    fn notify(&self, matches: &[MatchedDate]) -> Result<()>;

    /// End-of-day roll-up. Optional for delivery channels that don't report.
    fn summary(&self, _day: NaiveDate, _summary: &ScanSummary) -> Result<()> {
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, matches: &[MatchedDate]) -> Result<()> {
        log::info!("{}", format_match_message(matches));
        Ok(())
    }

    fn summary(&self, day: NaiveDate, summary: &ScanSummary) -> Result<()> {
        log::info!("{}", format_daily_summary(day, summary));
        Ok(())
    }
}
