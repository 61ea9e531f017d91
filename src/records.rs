use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{abort_on_write_failure, read_or, run_in_tx};
use crate::model::TrackerRecord;
use crate::time::now_ms;
use crate::{AppError, AppResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Completion records: at most one per tracker per calendar day.
#[derive(Clone, Copy)]
pub struct RecordStore<'c> {
    conn: &'c Connection,
}

impl<'c> RecordStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Mark the tracker complete on `date`. Completing the same day twice
    /// keeps one record; an unknown tracker is logged and ignored.
    pub fn create(&self, tracker_id: &Uuid, date: NaiveDate) {
        let inserted = abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                let known: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM trackers WHERE id = ?1",
                        params![tracker_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if known.is_none() {
                    return Ok(None);
                }
                let changed = tx.execute(
                    "INSERT OR IGNORE INTO records (tracker_id, date, created_at) VALUES (?1, ?2, ?3)",
                    params![tracker_id.to_string(), day_key(date), now_ms()],
                )?;
                Ok(Some(changed > 0))
            }),
            "record_create",
        );
        match inserted {
            Some(true) => {
                info!(target: "tracker", event = "record_created", tracker_id = %tracker_id, date = %date)
            }
            Some(false) => {
                debug!(target: "tracker", event = "record_exists", tracker_id = %tracker_id, date = %date)
            }
            None => {
                warn!(target: "tracker", event = "record_missing_tracker", tracker_id = %tracker_id, date = %date)
            }
        }
    }

    /// Whether the tracker was completed on the same calendar day as `date`.
    pub fn exists(&self, tracker_id: &Uuid, date: NaiveDate) -> bool {
        let result = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE tracker_id = ?1 AND date = ?2",
                params![tracker_id.to_string(), day_key(date)],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(AppError::from);
        read_or(result, "record_exists", false)
    }

    pub fn completed_count(&self, tracker_id: &Uuid) -> u64 {
        let result = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE tracker_id = ?1",
                params![tracker_id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .map_err(AppError::from);
        read_or(result, "record_count", 0).max(0) as u64
    }

    pub fn total_completed_count(&self) -> u64 {
        let result = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
            .map_err(AppError::from);
        read_or(result, "record_total", 0).max(0) as u64
    }

    /// Every record of one tracker, oldest day first.
    pub fn fetch_for(&self, tracker_id: &Uuid) -> Vec<TrackerRecord> {
        read_or(records_of(self.conn, tracker_id), "record_fetch", Vec::new())
    }

    /// Remove the record for that tracker and day. Fails with
    /// `RECORD/NOT_FOUND` when there is none.
    pub fn delete(&self, tracker_id: &Uuid, date: NaiveDate) -> AppResult<()> {
        let removed = abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                Ok(tx.execute(
                    "DELETE FROM records WHERE tracker_id = ?1 AND date = ?2",
                    params![tracker_id.to_string(), day_key(date)],
                )?)
            }),
            "record_delete",
        );
        if removed == 0 {
            return Err(AppError::new("RECORD/NOT_FOUND", "No completion recorded for that day")
                .with_context("tracker_id", tracker_id.to_string())
                .with_context("date", day_key(date)));
        }
        info!(target: "tracker", event = "record_deleted", tracker_id = %tracker_id, date = %date);
        Ok(())
    }

    pub fn delete_all(&self) {
        abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                tx.execute("DELETE FROM records", [])?;
                Ok(())
            }),
            "record_delete_all",
        );
        info!(target: "tracker", event = "records_cleared");
    }
}

fn day_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn records_of(conn: &Connection, tracker_id: &Uuid) -> AppResult<Vec<TrackerRecord>> {
    let mut stmt =
        conn.prepare_cached("SELECT date FROM records WHERE tracker_id = ?1 ORDER BY date")?;
    let days = stmt
        .query_map(params![tracker_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days
        .iter()
        .filter_map(|day| match NaiveDate::parse_from_str(day, DATE_FORMAT) {
            Ok(date) => Some(TrackerRecord {
                id: *tracker_id,
                date,
            }),
            Err(err) => {
                warn!(target: "tracker", event = "record_row_skipped", tracker_id = %tracker_id, stored = %day, error = %err);
                None
            }
        })
        .collect())
}
