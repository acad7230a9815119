use chrono::{Datelike, NaiveDate};

use crate::db::ScanSummary;
use crate::models::MatchedDate;

const MATCH_HEADLINE: &str = "New Shifts matching your availability";

fn ordinal_suffix(day: u32) -> &'static str {
    if (11..=13).contains(&(day % 100)) {
        return "th";
    }
    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// "Mon 9th June"
pub fn short_date(date: NaiveDate) -> String {
    format!(
        "{} {}{} {}",
        date.format("%a"),
        date.day(),
        ordinal_suffix(date.day()),
        date.format("%B")
    )
}

/// One-line batch message for a cycle's matches.
pub fn format_match_message(dates: &[MatchedDate]) -> String {
    if dates.is_empty() {
        return format!("{MATCH_HEADLINE}: (none)");
    }
    let listed: Vec<String> = dates.iter().map(|m| short_date(m.date)).collect();
    format!("{MATCH_HEADLINE}: {}", listed.join(", "))
}

/// Longer form used for mail-style bodies, one date per line.
pub fn format_match_list(dates: &[MatchedDate]) -> String {
    dates
        .iter()
        .map(|m| {
            let mut line = format!("- {}", m.date.format("%A, %B %d, %Y"));
            if m.count > 1 {
                line.push_str(&format!(" ({} slots)", m.count));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_daily_summary(day: NaiveDate, summary: &ScanSummary) -> String {
    let mut text = format!(
        "Daily summary for {}: {} scan(s), {} failed, {} new shift(s), {} matched",
        day.format("%Y-%m-%d"),
        summary.scans,
        summary.failed_scans,
        summary.new_shifts,
        summary.matched
    );
    if let Some(error) = &summary.last_error {
        text.push_str(&format!(". Last error: {error}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(y: i32, m: u32, d: u32) -> MatchedDate {
        MatchedDate {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            count: 1,
        }
    }

    #[test]
    fn ordinal_suffixes() {
        let cases = [
            (1, "st"),
            (2, "nd"),
            (3, "rd"),
            (4, "th"),
            (11, "th"),
            (12, "th"),
            (13, "th"),
            (21, "st"),
            (22, "nd"),
            (23, "rd"),
            (31, "st"),
        ];
        for (day, suffix) in cases {
            assert_eq!(ordinal_suffix(day), suffix, "day {day}");
        }
    }

    #[test]
    fn batches_dates_into_one_line() {
        let message = format_match_message(&[matched(2025, 6, 9), matched(2025, 6, 10)]);
        assert_eq!(
            message,
            "New Shifts matching your availability: Mon 9th June, Tue 10th June"
        );
    }

    #[test]
    fn empty_batch_says_none() {
        assert_eq!(
            format_match_message(&[]),
            "New Shifts matching your availability: (none)"
        );
    }

    #[test]
    fn list_form_mentions_extra_slots() {
        let mut second = matched(2025, 9, 20);
        second.count = 2;
        let text = format_match_list(&[matched(2025, 9, 12), second]);
        assert_eq!(
            text,
            "- Friday, September 12, 2025\n- Saturday, September 20, 2025 (2 slots)"
        );
    }

    #[test]
    fn summary_includes_last_error() {
        let summary = ScanSummary {
            scans: 3,
            failed_scans: 1,
            new_shifts: 4,
            matched: 2,
            last_error: Some("navigation failed".into()),
        };
        let text = format_daily_summary(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(), &summary);
        assert_eq!(
            text,
            "Daily summary for 2025-09-01: 3 scan(s), 1 failed, 4 new shift(s), 2 matched. Last error: navigation failed"
        );
    }
}
