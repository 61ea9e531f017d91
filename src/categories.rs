use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{abort_on_write_failure, read_or, run_in_tx};
use crate::mapping;
use crate::model::{Tracker, TrackerCategory, PINNED_CATEGORY};
use crate::time::now_ms;
use crate::{AppError, AppResult};

const DUPLICATE_CODE: &str = "CATEGORY/DUPLICATE";
const RESERVED_CODE: &str = "CATEGORY/RESERVED";
const EMPTY_TITLE_CODE: &str = "VALIDATION/EMPTY_TITLE";

/// Category CRUD plus the "Pinned" overlay.
///
/// Titles are unique. The reserved [`PINNED_CATEGORY`] row is created on the
/// first pin and dropped once its last pin is removed; pinning never moves a
/// tracker out of its own category.
#[derive(Clone, Copy)]
pub struct CategoryStore<'c> {
    conn: &'c Connection,
}

impl<'c> CategoryStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new, empty category.
    ///
    /// Blank, reserved and already-used titles are rejected.
    pub fn create(&self, title: &str) -> AppResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::new(EMPTY_TITLE_CODE, "Category title is empty"));
        }
        if title == PINNED_CATEGORY {
            return Err(AppError::new(RESERVED_CODE, "Category title is reserved")
                .with_context("title", title));
        }
        if read_or(category_id(self.conn, title), "category_lookup", None).is_some() {
            return Err(AppError::new(DUPLICATE_CODE, "Category already exists")
                .with_context("title", title));
        }

        abort_on_write_failure(insert_category(self.conn, title), "category_create");
        info!(target: "tracker", event = "category_created", title);
        Ok(())
    }

    /// File a new tracker under an existing category. Returns false (and
    /// logs) when no category carries `title`.
    pub fn add_tracker(&self, title: &str, tracker: &Tracker) -> bool {
        let Some(category_id) = read_or(category_id(self.conn, title), "category_lookup", None)
        else {
            warn!(target: "tracker", event = "category_missing", title, tracker_id = %tracker.id);
            return false;
        };
        let existing = read_or(
            mapping::load_tracker(self.conn, &tracker.id),
            "tracker_fetch_by_id",
            None,
        );
        if existing.is_some() {
            warn!(target: "tracker", event = "tracker_duplicate", title, tracker_id = %tracker.id);
            return false;
        }

        abort_on_write_failure(
            run_in_tx(self.conn, |tx| mapping::insert_tracker(tx, tracker, category_id)),
            "tracker_create",
        );
        info!(
            target: "tracker",
            event = "tracker_created",
            tracker_id = %tracker.id,
            category = title,
            kind = ?tracker.kind()
        );
        true
    }

    /// Every category with its trackers, in creation order.
    ///
    /// When trackers are pinned the "Pinned" category comes first and holds
    /// them; they are left out of their own category's list.
    pub fn fetch_all(&self) -> Vec<TrackerCategory> {
        read_or(self.try_fetch_all(), "category_fetch_all", Vec::new())
    }

    fn try_fetch_all(&self) -> AppResult<Vec<TrackerCategory>> {
        let categories = category_rows(self.conn)?;
        let trackers = mapping::load_trackers(self.conn, "", [])?;
        let pinned_ids = pinned_ids(self.conn)?;
        let pinned_set: HashSet<&Uuid> = pinned_ids.iter().collect();

        let mut by_category: HashMap<i64, Vec<Tracker>> = HashMap::new();
        let mut by_id: HashMap<Uuid, Tracker> = HashMap::new();
        for (tracker, category_id) in trackers {
            if pinned_set.contains(&tracker.id) {
                by_id.insert(tracker.id, tracker);
            } else {
                by_category.entry(category_id).or_default().push(tracker);
            }
        }

        let mut result = Vec::with_capacity(categories.len());
        let pinned: Vec<Tracker> = pinned_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();
        if !pinned.is_empty() {
            result.push(TrackerCategory::new(PINNED_CATEGORY, pinned));
        }
        for (id, title) in categories {
            if title == PINNED_CATEGORY {
                continue;
            }
            let trackers = by_category.remove(&id).unwrap_or_default();
            result.push(TrackerCategory::new(title, trackers));
        }
        Ok(result)
    }

    /// The category as stored. For a regular title this is its real
    /// membership, pinned trackers included; for "Pinned" it is the overlay.
    pub fn fetch_by_title(&self, title: &str) -> Option<TrackerCategory> {
        read_or(self.try_fetch_by_title(title), "category_fetch_by_title", None)
    }

    fn try_fetch_by_title(&self, title: &str) -> AppResult<Option<TrackerCategory>> {
        let title = title.trim();
        let Some(id) = category_id(self.conn, title)? else {
            return Ok(None);
        };
        let trackers = if title == PINNED_CATEGORY {
            mapping::load_trackers(
                self.conn,
                "JOIN pins p ON p.tracker_id = t.id WHERE p.category_id = ?1",
                params![id],
            )?
        } else {
            mapping::load_trackers(self.conn, "WHERE t.category_id = ?1", params![id])?
        };
        Ok(Some(TrackerCategory::new(
            title,
            trackers.into_iter().map(|(tracker, _)| tracker).collect(),
        )))
    }

    /// All stored titles in creation order, "Pinned" included when present.
    pub fn all_titles(&self) -> Vec<String> {
        let rows = read_or(category_rows(self.conn), "category_titles", Vec::new());
        rows.into_iter().map(|(_, title)| title).collect()
    }

    /// Titles a tracker can be filed under.
    pub fn titles_excluding_pinned(&self) -> Vec<String> {
        self.all_titles()
            .into_iter()
            .filter(|title| title != PINNED_CATEGORY)
            .collect()
    }

    /// Remove every category together with its trackers, schedules, pins and
    /// records.
    pub fn delete_all(&self) {
        abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                tx.execute_batch(
                    "DELETE FROM records;
                     DELETE FROM schedule_entries;
                     DELETE FROM pins;
                     DELETE FROM trackers;
                     DELETE FROM categories;",
                )?;
                Ok(())
            }),
            "category_delete_all",
        );
        info!(target: "tracker", event = "categories_cleared");
    }

    /// Overlay the tracker onto "Pinned", creating that category on first use.
    /// Returns false when the tracker is not stored.
    pub fn add_to_pinned(&self, tracker: &Tracker) -> bool {
        self.pin(&tracker.id)
    }

    pub fn pin(&self, tracker_id: &Uuid) -> bool {
        let exists = read_or(tracker_exists(self.conn, tracker_id), "tracker_lookup", false);
        if !exists {
            warn!(target: "tracker", event = "pin_missing_tracker", tracker_id = %tracker_id);
            return false;
        }

        abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                let pinned_id = match category_id(tx, PINNED_CATEGORY)? {
                    Some(id) => id,
                    None => {
                        insert_category(tx, PINNED_CATEGORY)?;
                        info!(target: "tracker", event = "pinned_category_created");
                        tx.last_insert_rowid()
                    }
                };
                tx.execute(
                    "INSERT OR IGNORE INTO pins (tracker_id, category_id, pinned_at) VALUES (?1, ?2, ?3)",
                    params![tracker_id.to_string(), pinned_id, now_ms()],
                )?;
                Ok(())
            }),
            "tracker_pin",
        );
        info!(target: "tracker", event = "tracker_pinned", tracker_id = %tracker_id);
        true
    }

    /// Drop the pin; the "Pinned" category goes away with its last pin.
    pub fn remove_from_pinned(&self, tracker_id: &Uuid) {
        let removed = abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                let removed = tx.execute(
                    "DELETE FROM pins WHERE tracker_id = ?1",
                    params![tracker_id.to_string()],
                )?;
                drop_pinned_if_empty(tx)?;
                Ok(removed)
            }),
            "tracker_unpin",
        );
        if removed == 0 {
            debug!(target: "tracker", event = "unpin_not_pinned", tracker_id = %tracker_id);
        } else {
            info!(target: "tracker", event = "tracker_unpinned", tracker_id = %tracker_id);
        }
    }

    pub fn is_pinned(&self, tracker_id: &Uuid) -> bool {
        let result = self
            .conn
            .query_row(
                "SELECT 1 FROM pins WHERE tracker_id = ?1",
                params![tracker_id.to_string()],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(AppError::from);
        read_or(result, "pin_lookup", false)
    }
}

pub(crate) fn insert_category(conn: &Connection, title: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO categories (title, created_at) VALUES (?1, ?2)",
        params![title, now_ms()],
    )?;
    Ok(())
}

/// Titles are stored trimmed, so lookups trim too.
pub(crate) fn category_id(conn: &Connection, title: &str) -> AppResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM categories WHERE title = ?1",
            params![title.trim()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(crate) fn category_title(conn: &Connection, id: i64) -> AppResult<Option<String>> {
    let title = conn
        .query_row(
            "SELECT title FROM categories WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(title)
}

fn category_rows(conn: &Connection) -> AppResult<Vec<(i64, String)>> {
    let mut stmt = conn.prepare_cached("SELECT id, title FROM categories ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn pinned_ids(conn: &Connection) -> AppResult<Vec<Uuid>> {
    let mut stmt = conn.prepare_cached("SELECT tracker_id FROM pins ORDER BY pinned_at, rowid")?;
    let raw = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(raw
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect())
}

fn tracker_exists(conn: &Connection, tracker_id: &Uuid) -> AppResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM trackers WHERE id = ?1",
            params![tracker_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Delete the category when no tracker is filed under it any more.
pub(crate) fn drop_if_empty(conn: &Connection, category_id: i64) -> AppResult<bool> {
    let removed = conn.execute(
        "DELETE FROM categories WHERE id = ?1
           AND NOT EXISTS (SELECT 1 FROM trackers WHERE category_id = ?1)
           AND NOT EXISTS (SELECT 1 FROM pins WHERE category_id = ?1)",
        params![category_id],
    )?;
    Ok(removed > 0)
}

pub(crate) fn drop_pinned_if_empty(conn: &Connection) -> AppResult<()> {
    if let Some(id) = category_id(conn, PINNED_CATEGORY)? {
        if drop_if_empty(conn, id)? {
            info!(target: "tracker", event = "pinned_category_dropped");
        }
    }
    Ok(())
}
