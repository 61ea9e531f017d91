#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use chrono::NaiveDate;
use tracker_lib::db::Database;
use tracker_lib::model::{Tracker, TrackerColor, WeekDay};

pub fn memory_db() -> Database {
    Database::open_in_memory().expect("open in-memory database")
}

pub fn habit(name: &str, days: &[WeekDay]) -> Tracker {
    Tracker::new(name, TrackerColor::Green, "🙂", days.iter().copied())
}

pub fn event(name: &str) -> Tracker {
    Tracker::new(name, TrackerColor::Coral, "🏓", [])
}

/// 2025-03-03 is a Monday; `monday() + n` walks the week.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

pub fn day_of_week(day: WeekDay) -> NaiveDate {
    monday() + chrono::Days::new(day.index() as u64)
}

pub fn titles(categories: &[tracker_lib::model::TrackerCategory]) -> Vec<&str> {
    categories.iter().map(|c| c.title.as_str()).collect()
}

pub fn names(category: &tracker_lib::model::TrackerCategory) -> Vec<&str> {
    category.trackers.iter().map(|t| t.name.as_str()).collect()
}
