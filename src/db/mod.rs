mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{ScanRun, ScanStatus, ScanSummary, ScanTrigger, ShiftRecord};
pub use repositories::shifts::UpsertOutcome;

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;

    /// Fresh database in a temp dir. Keep the dir alive for the test's duration.
    pub fn temp_database() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("shiftwatch.sqlite3")).expect("open database");
        (dir, db)
    }
}
