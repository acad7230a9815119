use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{ScanRun, ScanTrigger};
use crate::error::ScanError;
use crate::models::MatchedDate;

use super::context::{ScanContext, SessionState};
use super::cycle::ScanServices;
use super::loop_worker::scan_loop;

/// What to do when a cycle is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Reject,
    /// Queue behind the running cycle.
    Wait,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub run: ScanRun,
    pub matches: Vec<MatchedDate>,
    pub notified: bool,
    pub pruned: usize,
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Single-flight gate over scan cycles. Scheduled and manual scans share
/// the one lock because both drive the same calendar window.
#[derive(Clone)]
pub struct ScanController {
    services: Arc<ScanServices>,
    session: Arc<Mutex<SessionState>>,
    running: Arc<AtomicBool>,
    cycle_timeout: Duration,
}

impl ScanController {
    pub fn new(services: ScanServices, cycle_timeout: Duration) -> Self {
        Self {
            services: Arc::new(services),
            session: Arc::new(Mutex::new(SessionState::default())),
            running: Arc::new(AtomicBool::new(false)),
            cycle_timeout,
        }
    }

    pub fn services(&self) -> &ScanServices {
        &self.services
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn run(&self, trigger: ScanTrigger, admission: Admission) -> Result<ScanReport, ScanError> {
        self.run_at(trigger, admission, Local::now().date_naive()).await
    }

    /// Like [`run`](Self::run) with an explicit "today".
    pub async fn run_at(
        &self,
        trigger: ScanTrigger,
        admission: Admission,
        today: NaiveDate,
    ) -> Result<ScanReport, ScanError> {
        let mut session = match admission {
            Admission::Reject => self
                .session
                .try_lock()
                .map_err(|_| ScanError::AlreadyRunning)?,
            Admission::Wait => self.session.lock().await,
        };
        self.running.store(true, Ordering::SeqCst);
        let _running = RunningFlag(&self.running);

        let mut ctx = ScanContext::new(
            Uuid::new_v4().to_string(),
            trigger,
            today,
            self.services.months_per_cycle,
            &mut session,
        );
        info!("Starting {} scan {}", trigger.as_str(), ctx.run_id());

        let outcome = tokio::time::timeout(self.cycle_timeout, self.services.run_cycle(&mut ctx))
            .await
            .unwrap_or_else(|_| Err(ScanError::TimedOut(self.cycle_timeout)));

        let (run, result) = match outcome {
            Ok(cycle) => {
                let run = ctx.finish(None);
                let report = ScanReport {
                    run: run.clone(),
                    matches: cycle.matches,
                    notified: cycle.notified,
                    pruned: cycle.pruned,
                };
                (run, Ok(report))
            }
            Err(err) => (ctx.finish(Some(err.to_string())), Err(err)),
        };

        if let Err(err) = self.services.reconciler.database().insert_scan_run(&run).await {
            log::error!("Failed to record scan run {}: {err:#}", run.id);
        }
        info!(
            "Scan {} finished: {} ({} month(s), {} failed, {} new shift(s), {} matched)",
            run.id,
            run.status.as_str(),
            run.months_scanned,
            run.months_failed,
            run.new_shifts,
            run.matched
        );
        result
    }
}

/// Owns the periodic scan task.
pub struct ScanScheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ScanScheduler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, controller: ScanController, interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("scan loop already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(controller, interval, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("scan loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new()
    }
}
