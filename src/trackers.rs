use rusqlite::{params, Connection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::categories::{
    category_id, category_title, drop_if_empty, drop_pinned_if_empty, insert_category,
    CategoryStore,
};
use crate::db::{abort_on_write_failure, read_or, run_in_tx};
use crate::mapping;
use crate::model::{Tracker, WeekDay, PINNED_CATEGORY};
use crate::AppResult;

/// Tracker CRUD and the weekday query.
#[derive(Clone, Copy)]
pub struct TrackerStore<'c> {
    conn: &'c Connection,
}

impl<'c> TrackerStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Persist `tracker` under the category titled `category`. Returns the
    /// stored value as read back, or `None` when the category is unknown.
    pub fn create(&self, tracker: &Tracker, category: &str) -> Option<Tracker> {
        if !CategoryStore::new(self.conn).add_tracker(category, tracker) {
            return None;
        }
        self.fetch_by_id(&tracker.id)
    }

    pub fn fetch_by_id(&self, id: &Uuid) -> Option<Tracker> {
        read_or(mapping::load_tracker(self.conn, id), "tracker_fetch_by_id", None)
            .map(|(tracker, _)| tracker)
    }

    pub fn exists(&self, id: &Uuid) -> bool {
        self.fetch_by_id(id).is_some()
    }

    /// Trackers shown on `day`: every event, plus the habits whose schedule
    /// lists that day. Schedule rows that are not a stored weekday name are
    /// ignored here as they are when a row is read.
    pub fn fetch_by_day_of_week(&self, day: WeekDay) -> Vec<Tracker> {
        let result = mapping::load_trackers(
            self.conn,
            "WHERE NOT EXISTS (SELECT 1 FROM schedule_entries s
                               WHERE s.tracker_id = t.id
                                 AND s.weekday IN ('Monday', 'Tuesday', 'Wednesday', 'Thursday',
                                                   'Friday', 'Saturday', 'Sunday'))
                OR EXISTS (SELECT 1 FROM schedule_entries s
                           WHERE s.tracker_id = t.id AND s.weekday = ?1)",
            params![day.name()],
        );
        read_or(result, "tracker_fetch_by_day", Vec::new())
            .into_iter()
            .map(|(tracker, _)| tracker)
            .collect()
    }

    pub fn fetch_all(&self) -> Vec<Tracker> {
        read_or(mapping::load_trackers(self.conn, "", []), "tracker_fetch_all", Vec::new())
            .into_iter()
            .map(|(tracker, _)| tracker)
            .collect()
    }

    /// Overwrite name, color and emoji and replace the schedule. Returns
    /// false (and logs) for an unknown id.
    pub fn update(&self, tracker: &Tracker) -> bool {
        let updated = abort_on_write_failure(
            run_in_tx(self.conn, |tx| mapping::update_tracker(tx, tracker)),
            "tracker_update",
        );
        if updated {
            info!(target: "tracker", event = "tracker_updated", tracker_id = %tracker.id);
        } else {
            warn!(target: "tracker", event = "tracker_update_missing", tracker_id = %tracker.id);
        }
        updated
    }

    /// Re-file an existing tracker under another category. The tracker is
    /// recreated there with the same id; its records and pin survive.
    pub fn recreate_in_category(&self, tracker: &Tracker, category: &str) -> bool {
        let Some(target) = read_or(category_id(self.conn, category), "category_lookup", None)
        else {
            warn!(target: "tracker", event = "category_missing", title = category, tracker_id = %tracker.id);
            return false;
        };
        let current = read_or(
            mapping::load_tracker(self.conn, &tracker.id),
            "tracker_fetch_by_id",
            None,
        );
        match current {
            None => {
                warn!(target: "tracker", event = "tracker_update_missing", tracker_id = %tracker.id);
                return false;
            }
            Some((_, existing)) if existing == target => return self.update(tracker),
            Some(_) => {}
        }

        abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                let id = tracker.id.to_string();
                let dates = record_dates(tx, &id)?;
                let was_pinned = pinned_at(tx, &id)?;
                delete_cascade(tx, &tracker.id)?;
                mapping::insert_tracker(tx, tracker, target)?;
                let mut restore = tx.prepare_cached(
                    "INSERT INTO records (tracker_id, date, created_at) VALUES (?1, ?2, ?3)",
                )?;
                for (date, created_at) in dates {
                    restore.execute(params![id, date, created_at])?;
                }
                if let Some((pin_category, at)) = was_pinned {
                    // The pinned category may have been dropped with the old row.
                    let pin_category = match category_title(tx, pin_category)? {
                        Some(_) => pin_category,
                        None => {
                            insert_category(tx, PINNED_CATEGORY)?;
                            tx.last_insert_rowid()
                        }
                    };
                    tx.execute(
                        "INSERT INTO pins (tracker_id, category_id, pinned_at) VALUES (?1, ?2, ?3)",
                        params![id, pin_category, at],
                    )?;
                }
                Ok(())
            }),
            "tracker_recreate",
        );
        info!(
            target: "tracker",
            event = "tracker_recategorized",
            tracker_id = %tracker.id,
            category
        );
        true
    }

    /// Delete the tracker with its schedule, pin and records. A category left
    /// without trackers is deleted as well.
    pub fn delete(&self, id: &Uuid) -> bool {
        let outcome = abort_on_write_failure(
            run_in_tx(self.conn, |tx| delete_cascade(tx, id)),
            "tracker_delete",
        );
        match outcome {
            Some(dropped_category) => {
                info!(
                    target: "tracker",
                    event = "tracker_deleted",
                    tracker_id = %id,
                    category_dropped = dropped_category
                );
                true
            }
            None => {
                warn!(target: "tracker", event = "tracker_delete_missing", tracker_id = %id);
                false
            }
        }
    }

    /// Title of the category the tracker is filed under (never "Pinned").
    pub fn category_name(&self, id: &Uuid) -> Option<String> {
        let result = mapping::load_tracker(self.conn, id).and_then(|found| match found {
            Some((_, category)) => category_title(self.conn, category),
            None => Ok(None),
        });
        read_or(result, "tracker_category_name", None)
    }

    /// Remove all trackers and everything they own. Regular categories are
    /// kept; the pinned category disappears with its pins.
    pub fn delete_all(&self) {
        abort_on_write_failure(
            run_in_tx(self.conn, |tx| {
                tx.execute_batch(
                    "DELETE FROM records;
                     DELETE FROM schedule_entries;
                     DELETE FROM pins;
                     DELETE FROM trackers;",
                )?;
                drop_pinned_if_empty(tx)
            }),
            "tracker_delete_all",
        );
        info!(target: "tracker", event = "trackers_cleared");
    }
}

/// Explicit cascade for one tracker. Returns `None` when the tracker is not
/// stored, otherwise whether its category was dropped.
fn delete_cascade(conn: &Connection, id: &Uuid) -> AppResult<Option<bool>> {
    let Some((_, category)) = mapping::load_tracker(conn, id)? else {
        return Ok(None);
    };
    let id = id.to_string();
    conn.execute("DELETE FROM records WHERE tracker_id = ?1", params![id])?;
    conn.execute("DELETE FROM schedule_entries WHERE tracker_id = ?1", params![id])?;
    conn.execute("DELETE FROM pins WHERE tracker_id = ?1", params![id])?;
    conn.execute("DELETE FROM trackers WHERE id = ?1", params![id])?;
    let dropped = drop_if_empty(conn, category)?;
    if dropped {
        info!(target: "tracker", event = "category_dropped_empty", category_id = category);
    }
    drop_pinned_if_empty(conn)?;
    Ok(Some(dropped))
}

fn record_dates(conn: &Connection, tracker_id: &str) -> AppResult<Vec<(String, i64)>> {
    let mut stmt =
        conn.prepare_cached("SELECT date, created_at FROM records WHERE tracker_id = ?1")?;
    let rows = stmt
        .query_map(params![tracker_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn pinned_at(conn: &Connection, tracker_id: &str) -> AppResult<Option<(i64, i64)>> {
    use rusqlite::OptionalExtension;

    let found = conn
        .query_row(
            "SELECT category_id, pinned_at FROM pins WHERE tracker_id = ?1",
            params![tracker_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::model::TrackerColor;

    #[test]
    fn create_requires_known_category() {
        let db = Database::open_in_memory().unwrap();
        let store = TrackerStore::new(db.conn());
        let tracker = Tracker::new("Read", TrackerColor::Sand, "🎸", [WeekDay::Sunday]);
        assert!(store.create(&tracker, "Nowhere").is_none());

        CategoryStore::new(db.conn()).create("Hobby").unwrap();
        let stored = store.create(&tracker, "Hobby").unwrap();
        assert_eq!(stored, tracker);
        assert_eq!(store.category_name(&tracker.id).as_deref(), Some("Hobby"));
    }

    #[test]
    fn recreate_moves_tracker_and_keeps_records() {
        let db = Database::open_in_memory().unwrap();
        let categories = CategoryStore::new(db.conn());
        let store = TrackerStore::new(db.conn());
        categories.create("Home").unwrap();
        categories.create("Work").unwrap();
        let mut tracker = Tracker::new("Plan", TrackerColor::Blue, "🤔", [WeekDay::Monday]);
        store.create(&tracker, "Home").unwrap();
        db.conn()
            .execute(
                "INSERT INTO records (tracker_id, date, created_at) VALUES (?1, '2025-02-17', 0)",
                params![tracker.id.to_string()],
            )
            .unwrap();
        categories.pin(&tracker.id);

        tracker.name = "Plan week".into();
        assert!(store.recreate_in_category(&tracker, "Work"));

        assert_eq!(store.category_name(&tracker.id).as_deref(), Some("Work"));
        assert_eq!(store.fetch_by_id(&tracker.id).unwrap().name, "Plan week");
        assert!(categories.is_pinned(&tracker.id));
        assert!(categories.fetch_by_title("Home").is_none(), "emptied category dropped");
        let records: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(records, 1);
    }

    #[test]
    fn weekday_listing_agrees_with_stored_schedule() {
        let db = Database::open_in_memory().unwrap();
        let store = TrackerStore::new(db.conn());
        CategoryStore::new(db.conn()).create("Home").unwrap();
        let habit = Tracker::new("Stretch", TrackerColor::Mint, "🥦", [WeekDay::Monday]);
        let odd = Tracker::new("Odd", TrackerColor::Sand, "🏓", [WeekDay::Friday]);
        store.create(&habit, "Home").unwrap();
        store.create(&odd, "Home").unwrap();
        let conn = db.conn();
        conn.execute(
            "INSERT INTO schedule_entries (tracker_id, weekday) VALUES (?1, 'tuesday')",
            params![habit.id.to_string()],
        )
        .unwrap();
        conn.execute(
            "UPDATE schedule_entries SET weekday = 'Fr' WHERE tracker_id = ?1",
            params![odd.id.to_string()],
        )
        .unwrap();

        let stored = store.fetch_by_id(&habit.id).unwrap();
        assert_eq!(stored.schedule, std::collections::BTreeSet::from([WeekDay::Monday]));
        // Only malformed rows left, so it reads back as an event.
        assert!(store.fetch_by_id(&odd.id).unwrap().schedule.is_empty());

        let ids = |day| -> Vec<Uuid> {
            store.fetch_by_day_of_week(day).into_iter().map(|t| t.id).collect()
        };
        assert_eq!(ids(WeekDay::Monday), vec![habit.id, odd.id]);
        assert_eq!(ids(WeekDay::Tuesday), vec![odd.id]);
    }

    #[test]
    fn delete_all_keeps_regular_categories() {
        let db = Database::open_in_memory().unwrap();
        let categories = CategoryStore::new(db.conn());
        let store = TrackerStore::new(db.conn());
        categories.create("Home").unwrap();
        let tracker = Tracker::new("Sweep", TrackerColor::Coral, "🙌", []);
        store.create(&tracker, "Home").unwrap();
        categories.pin(&tracker.id);

        store.delete_all();
        assert!(store.fetch_all().is_empty());
        assert_eq!(categories.all_titles(), vec!["Home"]);
    }
}
