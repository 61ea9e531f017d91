//! Translation between domain values and their stored rows.
//!
//! Reading is lenient: a partially written tracker row maps to defaults
//! instead of failing, so one bad row never empties a whole listing.
//! Writing a schedule always replaces the stored set wholesale.

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, Connection, Row};
use tracing::warn;
use uuid::Uuid;

use crate::model::{Tracker, TrackerColor, WeekDay, DEFAULT_EMOJI, DEFAULT_NAME};
use crate::time::now_ms;
use crate::AppResult;

pub(crate) const TRACKER_COLUMNS: &str = "t.id, t.name, t.color, t.emoji, t.category_id";

/// A `trackers` row as stored, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct TrackerEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub color: Option<String>,
    pub emoji: Option<String>,
    pub category_id: Option<i64>,
}

impl TrackerEntity {
    /// Expects the columns in [`TRACKER_COLUMNS`] order.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            emoji: row.get(3)?,
            category_id: row.get(4)?,
        })
    }

    pub fn from_tracker(tracker: &Tracker, category_id: i64) -> Self {
        Self {
            id: Some(tracker.id.to_string()),
            name: Some(tracker.name.clone()),
            color: Some(tracker.color.token().to_string()),
            emoji: Some(tracker.emoji.clone()),
            category_id: Some(category_id),
        }
    }

    /// Build the domain value, substituting defaults for anything missing or
    /// unreadable.
    pub fn into_tracker<I, S>(self, schedule: I) -> Tracker
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = match self.id.as_deref().map(Uuid::parse_str) {
            Some(Ok(id)) => id,
            Some(Err(_)) | None => {
                warn!(
                    target: "tracker",
                    event = "tracker_row_defaulted",
                    field = "id",
                    stored = self.id.as_deref().unwrap_or("<null>")
                );
                Uuid::new_v4()
            }
        };
        let color = match self.color.as_deref().map(str::parse::<TrackerColor>) {
            Some(Ok(color)) => color,
            _ => TrackerColor::default(),
        };
        Tracker {
            id,
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            color,
            emoji: self.emoji.unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            schedule: parse_schedule(id, schedule),
        }
    }
}

fn parse_schedule<I, S>(id: Uuid, names: I) -> BTreeSet<WeekDay>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let day = WeekDay::from_stored(name);
            if day.is_none() {
                warn!(
                    target: "tracker",
                    event = "schedule_entry_skipped",
                    tracker_id = %id,
                    weekday = name
                );
            }
            day
        })
        .collect()
}

/// Stored weekday names for one tracker.
pub fn schedule_of(conn: &Connection, tracker_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT weekday FROM schedule_entries WHERE tracker_id = ?1 ORDER BY rowid",
    )?;
    let names = stmt
        .query_map(params![tracker_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Stored weekday names for every tracker, keyed by tracker id.
pub fn all_schedules(conn: &Connection) -> AppResult<HashMap<String, Vec<String>>> {
    let mut stmt =
        conn.prepare_cached("SELECT tracker_id, weekday FROM schedule_entries ORDER BY rowid")?;
    let mut rows = stmt.query([])?;
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let tracker_id: String = row.get(0)?;
        let weekday: String = row.get(1)?;
        map.entry(tracker_id).or_default().push(weekday);
    }
    Ok(map)
}

/// Load one tracker row and its schedule.
pub fn load_tracker(conn: &Connection, tracker_id: &Uuid) -> AppResult<Option<(Tracker, i64)>> {
    let sql = format!("SELECT {TRACKER_COLUMNS} FROM trackers t WHERE t.id = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params![tracker_id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let entity = TrackerEntity::from_row(row)?;
    let category_id = entity.category_id.unwrap_or_default();
    let schedule = schedule_of(conn, &tracker_id.to_string())?;
    Ok(Some((entity.into_tracker(schedule), category_id)))
}

/// Load the trackers selected by `where_clause` (appended after the column
/// list) with their schedules, in insertion order.
pub fn load_trackers<P>(
    conn: &Connection,
    where_clause: &str,
    params: P,
) -> AppResult<Vec<(Tracker, i64)>>
where
    P: rusqlite::Params,
{
    let schedules = all_schedules(conn)?;
    let sql = format!("SELECT {TRACKER_COLUMNS} FROM trackers t {where_clause} ORDER BY t.rowid");
    let mut stmt = conn.prepare(&sql)?;
    let entities = stmt
        .query_map(params, TrackerEntity::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entities
        .into_iter()
        .map(|entity| {
            let category_id = entity.category_id.unwrap_or_default();
            let schedule = entity
                .id
                .as_ref()
                .and_then(|id| schedules.get(id))
                .cloned()
                .unwrap_or_default();
            (entity.into_tracker(schedule), category_id)
        })
        .collect())
}

/// Insert the tracker row and one schedule entry per weekday.
pub fn insert_tracker(conn: &Connection, tracker: &Tracker, category_id: i64) -> AppResult<()> {
    let entity = TrackerEntity::from_tracker(tracker, category_id);
    let now = now_ms();
    conn.execute(
        "INSERT INTO trackers (id, category_id, name, color, emoji, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            entity.id,
            entity.category_id,
            entity.name,
            entity.color,
            entity.emoji,
            now
        ],
    )?;
    insert_schedule(conn, tracker)?;
    Ok(())
}

/// Overwrite the scalar columns and replace the schedule set. Returns false
/// when no row carries the tracker's id.
pub fn update_tracker(conn: &Connection, tracker: &Tracker) -> AppResult<bool> {
    let id = tracker.id.to_string();
    let changed = conn.execute(
        "UPDATE trackers SET name = ?1, color = ?2, emoji = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            tracker.name,
            tracker.color.token(),
            tracker.emoji,
            now_ms(),
            id
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    conn.execute(
        "DELETE FROM schedule_entries WHERE tracker_id = ?1",
        params![id],
    )?;
    insert_schedule(conn, tracker)?;
    Ok(true)
}

fn insert_schedule(conn: &Connection, tracker: &Tracker) -> AppResult<()> {
    let id = tracker.id.to_string();
    let mut stmt = conn
        .prepare_cached("INSERT INTO schedule_entries (tracker_id, weekday) VALUES (?1, ?2)")?;
    for day in &tracker.schedule {
        stmt.execute(params![id, day.name()])?;
    }
    Ok(())
}
