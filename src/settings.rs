use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard},
    time::Duration,
};

use crate::reconcile::ReconcileConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanSettings {
    /// Seconds between scheduled scans.
    pub scan_interval_seconds: u64,
    /// Months per cycle, starting at the current one.
    pub months_per_cycle: u32,
    /// Months after the current one for which an empty observation is
    /// treated as a failed read rather than "no shifts".
    pub near_current_months: u32,
    pub cycle_timeout_seconds: u64,
    /// Anchor template images. Relative paths resolve against the data
    /// directory.
    pub templates_dir: PathBuf,
    /// Where captured calendar screenshots are read from.
    pub capture_dir: PathBuf,
    /// Intermediate crops and masks are written here when set.
    pub diagnostics_dir: Option<PathBuf>,
    pub tesseract_lang: String,
    pub tesseract_data_path: Option<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 600,
            months_per_cycle: 4,
            near_current_months: 1,
            cycle_timeout_seconds: 300,
            templates_dir: PathBuf::from("templates"),
            capture_dir: PathBuf::from("screenshots"),
            diagnostics_dir: None,
            tesseract_lang: "eng".into(),
            tesseract_data_path: None,
        }
    }
}

impl ScanSettings {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_seconds)
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            near_current_months: self.near_current_months,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ScanSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring malformed settings in {}: {err}", path.display());
                ScanSettings::default()
            })
        } else {
            ScanSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scan(&self) -> Result<ScanSettings> {
        Ok(self.read()?.clone())
    }

    /// Directory-valued settings resolved against `base`.
    pub fn resolve(&self, base: &Path) -> Result<ScanSettings> {
        let mut settings = self.scan()?;
        let absolutize = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        settings.templates_dir = absolutize(&settings.templates_dir);
        settings.capture_dir = absolutize(&settings.capture_dir);
        settings.diagnostics_dir = settings.diagnostics_dir.as_deref().map(absolutize);
        Ok(settings)
    }

    /// Write the current settings out when no file exists yet, so a fresh
    /// data directory starts with an editable `settings.json`. Returns
    /// whether a file was written.
    pub fn write_defaults_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.persist(&*self.read()?)?;
        Ok(true)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ScanSettings>> {
        self.data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    fn persist(&self, data: &ScanSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
