use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::error::{ExtractionError, ScanError};
use crate::models::{MatchedDate, Period, ScanObservation};
use crate::notify::Notifier;
use crate::reconcile::{PruneOutcome, Reconciler};
use crate::vision::ShiftExtractor;

use super::context::ScanContext;
use super::source::CalendarNavigator;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// What a finished cycle produced besides its run record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    pub matches: Vec<MatchedDate>,
    pub notified: bool,
    pub pruned: usize,
}

/// Collaborators a scan cycle drives.
pub struct ScanServices {
    pub reconciler: Reconciler,
    pub extractor: Arc<ShiftExtractor>,
    pub navigator: Arc<Mutex<Box<dyn CalendarNavigator>>>,
    pub notifier: Arc<dyn Notifier>,
    pub months_per_cycle: u32,
}

impl ScanServices {
    pub fn new(
        reconciler: Reconciler,
        extractor: ShiftExtractor,
        navigator: impl CalendarNavigator + 'static,
        notifier: Arc<dyn Notifier>,
        months_per_cycle: u32,
    ) -> Self {
        Self {
            reconciler,
            extractor: Arc::new(extractor),
            navigator: Arc::new(Mutex::new(Box::new(navigator))),
            notifier,
            months_per_cycle: months_per_cycle.max(1),
        }
    }

    async fn navigate<T, F>(&self, step: &'static str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn CalendarNavigator>) -> Result<T> + Send + 'static,
    {
        let navigator = Arc::clone(&self.navigator);
        tokio::task::spawn_blocking(move || {
            let mut guard = navigator
                .lock()
                .map_err(|_| anyhow!("calendar navigator lock poisoned"))?;
            op(&mut *guard)
        })
        .await
        .with_context(|| format!("{step} worker join failed"))?
        .with_context(|| format!("{step} failed"))
    }

    async fn extract(
        &self,
        screenshot: RgbImage,
        expected: Period,
    ) -> Result<ScanObservation, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&screenshot, expected))
            .await
            .map_err(|err| ExtractionError::Recognition(anyhow!("extraction worker join failed: {err}")))?
    }

    /// One pass over `months_per_cycle` months starting at the current one.
    /// Month-level failures are recorded on `ctx` and skipped.
    pub(crate) async fn run_cycle(
        &self,
        ctx: &mut ScanContext<'_>,
    ) -> Result<CycleOutcome, ScanError> {
        ctx.prepare_diagnostics(self.extractor.diagnostics());

        self.navigate("reset to today", |nav| nav.reset_to_today())
            .await
            .map_err(ScanError::Navigation)?;

        let mut expected = Period::containing(ctx.today());
        for index in 0..self.months_per_cycle {
            if index > 0 {
                if let Err(err) = self.navigate("advance month", |nav| nav.advance_month()).await {
                    log_warn!("Stopping scan after {index} month(s): {err:#}");
                    ctx.record_error(format!("navigation stopped before month {}: {err:#}", index + 1));
                    break;
                }
                expected = expected.succ();
            }

            let screenshot = match self.navigate("capture", |nav| nav.capture()).await {
                Ok(image) => image,
                Err(err) => {
                    log_warn!("Capture failed for {expected}: {err:#}");
                    ctx.record_month_failure(format!("{expected}: {err:#}"));
                    continue;
                }
            };

            match self.extract(screenshot, expected).await {
                Ok(observation) => {
                    // navigation may have drifted; follow what the screen says
                    expected = observation.period;
                    self.apply_observation(ctx, &observation).await;
                }
                Err(err) => {
                    log_warn!("Skipping {expected}: {err}");
                    ctx.record_month_failure(format!("{expected}: {err}"));
                }
            }
        }

        if let Err(err) = self.navigate("return to today", |nav| nav.reset_to_today()).await {
            log_warn!("Could not return calendar to today: {err:#}");
            ctx.record_error(format!("return to today: {err:#}"));
        }

        let pruned = self.prune(ctx).await;

        let matches = self
            .reconciler
            .compute_matches(ctx.new_open_dates())
            .await
            .map_err(ScanError::Store)?;
        ctx.set_matched(matches.len());

        let notified = self.deliver(ctx, &matches).await?;

        Ok(CycleOutcome {
            matches,
            notified,
            pruned,
        })
    }

    async fn apply_observation(&self, ctx: &mut ScanContext<'_>, observation: &ScanObservation) {
        for (date, shift) in observation.entries() {
            match self.reconciler.upsert(*date, shift.kind, shift.count).await {
                Ok(outcome) => ctx.record_upsert(*date, shift.kind, outcome),
                Err(err) => {
                    log_error!("Failed to store {} shift on {date}: {err:#}", shift.kind.as_str());
                    ctx.record_error(format!("store {date}: {err:#}"));
                }
            }
        }
        ctx.record_observation(observation);
    }

    async fn prune(&self, ctx: &mut ScanContext<'_>) -> usize {
        let sets: Vec<_> = ctx
            .observed()
            .map(|(key, set)| (*key, set.clone()))
            .collect();

        let mut pruned = 0;
        for ((period, kind), set) in sets {
            if !set.trusted {
                log_info!(
                    "[safety] {} pass for {period} was incomplete; skipping cleanup",
                    kind.as_str()
                );
                continue;
            }
            match self
                .reconciler
                .prune_stale(period, kind, &set.dates, ctx.today())
                .await
            {
                Ok(PruneOutcome::Pruned(removed)) => pruned += removed,
                Ok(PruneOutcome::SkippedEmpty) => {}
                Err(err) => {
                    log_error!("Cleanup of {} shifts in {period} failed: {err:#}", kind.as_str());
                    ctx.record_error(format!("cleanup {period}: {err:#}"));
                }
            }
        }
        pruned
    }

    /// Hand the batch to the notifier; dates are marked alerted only after
    /// delivery succeeded.
    async fn deliver(
        &self,
        ctx: &mut ScanContext<'_>,
        matches: &[MatchedDate],
    ) -> Result<bool, ScanError> {
        if matches.is_empty() {
            return Ok(false);
        }

        let notifier = Arc::clone(&self.notifier);
        let batch = matches.to_vec();
        let delivery = tokio::task::spawn_blocking(move || notifier.notify(&batch))
            .await
            .context("notifier worker join failed")
            .and_then(|result| result);

        if let Err(err) = delivery {
            log_error!("Notification of {} matched date(s) failed: {err:#}", matches.len());
            ctx.record_error(format!("notify: {err:#}"));
            return Ok(false);
        }

        let dates: Vec<_> = matches.iter().map(|m| m.date).collect();
        self.reconciler
            .mark_alerted(&dates)
            .await
            .map_err(ScanError::Store)?;
        log_info!("Notified {} matched date(s)", dates.len());
        Ok(true)
    }
}
