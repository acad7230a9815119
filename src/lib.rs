pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod scan;
pub mod settings;
pub mod utils;
pub mod vision;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use db::{Database, ScanTrigger};
use notify::LogNotifier;
use reconcile::Reconciler;
use scan::{Admission, DirectoryNavigator, ScanController, ScanScheduler, ScanServices};
use settings::{ScanSettings, SettingsStore};
use vision::{AnchorTemplates, Calibration, Diagnostics, ShiftExtractor, TextRecognizer};

const DATA_DIR_ENV: &str = "SHIFTWATCH_DATA_DIR";

const USAGE: &str = "\
Usage: shiftwatch [--once]

Reads calendar screenshots, extracts open and booked shifts, and reports
open shifts on days marked available.

Options:
  --once    run a single scan and exit
  --help    print this message

Environment:
  SHIFTWATCH_DATA_DIR  data directory (default: current directory). Holds
                       settings.json, shiftwatch.sqlite3, templates/ (anchor
                       images) and screenshots/ (<n>.png per month).
  RUST_LOG             log filter, e.g. `shiftwatch_lib=debug`

Text recognition needs Tesseract: build with `cargo build --features tesseract`.
";

#[cfg(feature = "tesseract")]
fn build_recognizer(settings: &ScanSettings) -> Result<Arc<dyn TextRecognizer>> {
    let recognizer = vision::ocr::TesseractRecognizer::new(
        settings.tesseract_data_path.clone(),
        settings.tesseract_lang.clone(),
    )?;
    Ok(Arc::new(recognizer))
}

#[cfg(not(feature = "tesseract"))]
fn build_recognizer(_settings: &ScanSettings) -> Result<Arc<dyn TextRecognizer>> {
    anyhow::bail!(
        "this build has no text recognizer: install Tesseract and leptonica, then \
         rebuild with `cargo build --features tesseract` (see `shiftwatch --help`)"
    )
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn build_controller(data_dir: &std::path::Path, settings: &ScanSettings) -> Result<ScanController> {
    let database = Database::new(data_dir.join("shiftwatch.sqlite3"))?;

    let templates = AnchorTemplates::load(&settings.templates_dir)?;
    let mut extractor =
        ShiftExtractor::new(templates, build_recognizer(settings)?, Calibration::default());
    if let Some(dir) = &settings.diagnostics_dir {
        extractor = extractor.with_diagnostics(Diagnostics::new(dir));
    }

    let services = ScanServices::new(
        Reconciler::new(database, settings.reconcile_config()),
        extractor,
        DirectoryNavigator::new(&settings.capture_dir),
        Arc::new(LogNotifier),
        settings.months_per_cycle,
    );
    Ok(ScanController::new(services, settings.cycle_timeout()))
}

/// Entry point for the `shiftwatch` binary. `--once` runs a single manual
/// scan and exits; otherwise scans run on the configured interval until
/// Ctrl-C.
pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print!("{USAGE}");
        return Ok(());
    }
    if let Some(unknown) = args.iter().find(|arg| arg.as_str() != "--once") {
        anyhow::bail!("unknown argument `{unknown}`\n\n{USAGE}");
    }
    let once = !args.is_empty();

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let data_dir = data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join("settings.json"))?;
    if settings_store.write_defaults_if_missing()? {
        info!("Wrote default settings to {}", settings_store.path().display());
    }
    let settings = settings_store.resolve(&data_dir)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(data_dir, settings, once))
}

async fn serve(data_dir: PathBuf, settings: ScanSettings, once: bool) -> Result<()> {
    let controller = build_controller(&data_dir, &settings)?;

    if once {
        let report = controller.run(ScanTrigger::Manual, Admission::Wait).await?;
        info!(
            "Scan {} {}: {} matched date(s)",
            report.run.id,
            report.run.status.as_str(),
            report.matches.len()
        );
        return Ok(());
    }

    let mut scheduler = ScanScheduler::new();
    scheduler.start(controller, settings.scan_interval())?;
    info!(
        "Watching {} every {}s",
        settings.capture_dir.display(),
        settings.scan_interval_seconds
    );

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {err}");
    }
    info!("Shutting down");
    scheduler.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_names_the_data_layout() {
        for needle in [DATA_DIR_ENV, "--once", "settings.json", "templates/", "screenshots/", "--features tesseract"] {
            assert!(USAGE.contains(needle), "usage is missing {needle}");
        }
    }

    #[cfg(not(feature = "tesseract"))]
    #[test]
    fn missing_recognizer_explains_how_to_enable_it() {
        let err = match build_recognizer(&ScanSettings::default()) {
            Ok(_) => panic!("a recognizer was built without the tesseract feature"),
            Err(err) => err.to_string(),
        };
        assert!(err.contains("--features tesseract"));
        assert!(err.contains("--help"));
    }
}
