use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Transaction};
use tracing::{error, info, warn};

use crate::{migrate, AppError, AppResult};

/// The process-local store. Opened once by the composition root and lent to
/// the stores by reference.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (creating if missing) a file database and bring its schema up to date.
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!(
                    target: "tracker",
                    error = %e,
                    event = "data_dir_create_failed",
                    path = %parent.display()
                );
                AppError::from(e).with_context("path", parent.display().to_string())
            })?;
        }
        info!(target: "tracker", event = "db_path", path = %path.display());

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> AppResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.busy_timeout(std::time::Duration::from_millis(5000))?;
        log_effective_pragmas(&conn, path.is_some());
        migrate::apply_migrations(&conn)?;
        Ok(Self { conn, path })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run work inside a transaction. Commits on success, rolls back on error.
    pub fn run_in_tx<R, F>(&self, f: F) -> AppResult<R>
    where
        F: FnOnce(&Transaction<'_>) -> AppResult<R>,
    {
        run_in_tx(&self.conn, f)
    }
}

/// Free-function form of [`Database::run_in_tx`] for stores that only hold a
/// connection reference.
pub fn run_in_tx<R, F>(conn: &Connection, f: F) -> AppResult<R>
where
    F: FnOnce(&Transaction<'_>) -> AppResult<R>,
{
    let tx = conn.unchecked_transaction()?;
    match f(&tx) {
        Ok(val) => {
            tx.commit()?;
            Ok(val)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback() {
                error!(target: "tracker", event = "db_tx_rollback_failed", error = %rb);
            } else {
                warn!(target: "tracker", event = "db_tx_rollback", code = %e.code());
            }
            Err(e)
        }
    }
}

/// Reads degrade: a failed query is logged and the caller gets `fallback`.
pub fn read_or<T>(result: AppResult<T>, op: &'static str, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(
                target: "tracker",
                event = "read_failed",
                op,
                code = %err.code(),
                error = %err
            );
            fallback
        }
    }
}

/// Writes do not degrade. The local store has no recovery path, so a failed
/// write is reported as a critical failure and the process stops.
pub fn abort_on_write_failure<T>(result: AppResult<T>, op: &'static str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let critical = AppError::critical("DB/WRITE_FAILED", format!("{op}: {err}"))
                .with_context("op", op)
                .with_cause(err);
            panic!("unrecoverable store write failure: {critical}");
        }
    }
}

fn log_effective_pragmas(conn: &Connection, file_backed: bool) {
    let sqlite_ver: String = conn
        .query_row("select sqlite_version()", [], |row| row.get(0))
        .unwrap_or_else(|_| String::from("unknown"));
    let jm: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap_or_else(|_| String::from("unknown"));
    let sync: i64 = conn
        .query_row("PRAGMA synchronous;", [], |row| row.get(0))
        .unwrap_or(i64::MIN);
    let fks: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap_or(i64::MIN);

    info!(
        target: "tracker",
        event = "db_open",
        sqlite_version = %sqlite_ver,
        journal_mode = %jm,
        synchronous = sync,
        foreign_keys = fks
    );

    if file_backed && !jm.eq_ignore_ascii_case("wal") {
        warn!(
            target: "tracker",
            event = "db_open_warning",
            msg = "journal_mode != WAL; running with reduced crash safety"
        );
    }
}
