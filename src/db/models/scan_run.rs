use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanTrigger {
    Scheduled,
    Manual,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::Scheduled => "scheduled",
            ScanTrigger::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(ScanTrigger::Scheduled),
            "manual" => Some(ScanTrigger::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Every month extracted.
    Completed,
    /// At least one month failed or navigation stopped early.
    Partial,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Completed => "completed",
            ScanStatus::Partial => "partial",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(ScanStatus::Completed),
            "partial" => Some(ScanStatus::Partial),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRun {
    pub id: String,
    pub trigger: ScanTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub months_scanned: u32,
    pub months_failed: u32,
    pub new_shifts: u32,
    pub matched: u32,
    pub status: ScanStatus,
    pub error: Option<String>,
}

/// Per-day totals across all scan runs, fed to the daily summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub scans: u32,
    pub failed_scans: u32,
    pub new_shifts: u32,
    pub matched: u32,
    pub last_error: Option<String>,
}
