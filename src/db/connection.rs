use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const STORE_THREAD_NAME: &str = "shiftwatch-db";
/// How long a statement waits on a lock held by another process (an
/// external reader of the shift store, for example).
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreTask),
    Close,
}

/// Owns the worker thread; closing happens when the last handle is dropped.
struct StoreWorker {
    queue: mpsc::Sender<StoreCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };
        if self.queue.send(StoreCommand::Close).is_err() {
            error!("Shift store thread already gone at shutdown");
        }
        if let Err(err) = handle.join() {
            error!("Shift store thread panicked: {err:?}");
        }
    }
}

fn open_store(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open shift store {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode on shift store: {err}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set shift store busy timeout")?;
    run_migrations(&mut conn).context("failed to migrate shift store")?;
    Ok(conn)
}

/// Handle to the shift store. Every call is queued onto a single worker
/// thread that owns the SQLite connection, so tasks run one at a time in
/// submission order.
#[derive(Clone)]
pub struct Database {
    worker: Arc<StoreWorker>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create shift store directory {}", parent.display())
            })?;
        }

        let (queue, commands) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = db_path.clone();

        let thread = thread::Builder::new()
            .name(STORE_THREAD_NAME.into())
            .spawn(move || {
                let mut conn = match open_store(&thread_path) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                for command in commands {
                    match command {
                        StoreCommand::Run(task) => task(&mut conn),
                        StoreCommand::Close => break,
                    }
                }
                info!("Shift store thread stopped");
            })
            .context("failed to spawn shift store thread")?;

        ready_rx
            .recv()
            .context("shift store thread exited during startup")??;
        info!("Shift store ready at {}", db_path.display());

        Ok(Self {
            worker: Arc::new(StoreWorker {
                queue,
                thread: Mutex::new(Some(thread)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` on the store thread and wait for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let command = StoreCommand::Run(Box::new(move |conn| {
            // the caller may have timed out and dropped the receiver
            let _ = reply.send(task(conn));
        }));

        self.worker
            .queue
            .send(command)
            .map_err(|_| anyhow!("shift store thread is not running"))?;

        response
            .await
            .map_err(|_| anyhow!("shift store thread dropped the task"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directory_and_runs_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shifts.sqlite3");
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), path.as_path());

        let version: i32 = db
            .execute(|conn| {
                Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert!(version >= 1);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("shifts.sqlite3")).unwrap();
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("INSERT INTO no_such_table VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn data_survives_closing_and_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shifts.sqlite3");

        let db = Database::new(path.clone()).unwrap();
        db.execute(|conn| {
            conn.execute_batch("CREATE TABLE notes (body TEXT); INSERT INTO notes VALUES ('kept');")?;
            Ok(())
        })
        .await
        .unwrap();
        drop(db);

        let reopened = Database::new(path).unwrap();
        let body: String = reopened
            .execute(|conn| Ok(conn.query_row("SELECT body FROM notes", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(body, "kept");
    }
}
