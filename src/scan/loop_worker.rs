use chrono::{Local, NaiveDate, Utc};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::ScanTrigger;
use crate::error::ScanError;

use super::controller::{Admission, ScanController};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub async fn scan_loop(controller: ScanController, interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary_day = Utc::now().date_naive();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let day = Utc::now().date_naive();
                if day != summary_day {
                    send_daily_summary(&controller, summary_day).await;
                    summary_day = day;
                }

                match controller
                    .run_at(ScanTrigger::Scheduled, Admission::Reject, Local::now().date_naive())
                    .await
                {
                    Ok(report) => {
                        if !report.matches.is_empty() {
                            log_info!("Scheduled scan matched {} date(s)", report.matches.len());
                        }
                    }
                    Err(ScanError::AlreadyRunning) => {
                        log_info!("Scan already in progress; skipping scheduled tick");
                    }
                    Err(ScanError::TimedOut(limit)) => {
                        log_warn!("Scheduled scan timed out (> {limit:?})");
                    }
                    Err(err) => log_error!("Scheduled scan failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop shutting down");
                break;
            }
        }
    }
}

pub(crate) async fn send_daily_summary(controller: &ScanController, day: NaiveDate) {
    let services = controller.services();
    let summary = match services.reconciler.database().scan_summary_for_day(day).await {
        Ok(summary) => summary,
        Err(err) => {
            log_error!("Failed to build daily summary for {day}: {err:#}");
            return;
        }
    };

    let notifier = std::sync::Arc::clone(&services.notifier);
    let sent = tokio::task::spawn_blocking(move || notifier.summary(day, &summary)).await;
    match sent {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log_error!("Daily summary delivery failed: {err:#}"),
        Err(err) => log_error!("Daily summary worker join failed: {err}"),
    }
}
