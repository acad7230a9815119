use std::time::Duration;

use thiserror::Error;

use crate::models::Period;

/// Failures that stop extraction for a single screenshot.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not read the month/year caption (expected {expected})")]
    PeriodUnresolved { expected: Period },
    #[error("text recognition failed: {0}")]
    Recognition(anyhow::Error),
}

/// Rejections at the storage boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("invalid shift date '{0}'")]
    InvalidDate(String),
    #[error("shift count must be positive")]
    InvalidCount,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan cycle is already running")]
    AlreadyRunning,
    #[error("scan cycle exceeded {0:?}")]
    TimedOut(Duration),
    #[error("calendar navigation failed: {0:#}")]
    Navigation(anyhow::Error),
    #[error("shift store failed: {0:#}")]
    Store(anyhow::Error),
}
