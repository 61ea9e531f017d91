//! The facade the presentation layer talks to.
//!
//! `DataProvider` composes the three stores and keeps two projections of the
//! stored categories: `categories` (the selected weekday and completion
//! filter applied) and `visible_categories` (additionally narrowed by the
//! search text). Every mutation re-derives both and reports the difference
//! to subscribers as [`ChangeEvent`](crate::changes::ChangeEvent) batches.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::categories::CategoryStore;
use crate::changes::{diff, ChangeObserver, ChangeObservers, IndexPath, SubscriptionId};
use crate::model::{Tracker, TrackerCategory, TrackerKind, WeekDay, PINNED_CATEGORY};
use crate::records::RecordStore;
use crate::time::today;
use crate::trackers::TrackerStore;
use crate::{AppError, AppResult};

/// Completion filter offered next to the date picker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackerFilter {
    /// Everything scheduled on the selected day.
    #[default]
    All,
    /// Jump to today, then behave like `All`.
    Today,
    Completed,
    NotCompleted,
}

impl TrackerFilter {
    pub const ALL: [TrackerFilter; 4] = [
        TrackerFilter::All,
        TrackerFilter::Today,
        TrackerFilter::Completed,
        TrackerFilter::NotCompleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackerFilter::All => "all",
            TrackerFilter::Today => "today",
            TrackerFilter::Completed => "completed",
            TrackerFilter::NotCompleted => "not-completed",
        }
    }
}

impl fmt::Display for TrackerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown tracker filter: {0}")]
pub struct UnknownFilter(pub String);

impl FromStr for TrackerFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        TrackerFilter::ALL
            .into_iter()
            .find(|filter| filter.as_str() == wanted)
            .ok_or_else(|| UnknownFilter(s.to_string()))
    }
}

pub struct DataProvider<'c> {
    categories: CategoryStore<'c>,
    trackers: TrackerStore<'c>,
    records: RecordStore<'c>,
    selected_date: NaiveDate,
    weekday: WeekDay,
    filter: TrackerFilter,
    search: Option<String>,
    filtered: Vec<TrackerCategory>,
    visible: Vec<TrackerCategory>,
    observers: ChangeObservers,
}

impl<'c> DataProvider<'c> {
    /// A provider positioned on today with no filter or search.
    pub fn new(conn: &'c Connection) -> Self {
        Self::for_date(conn, today())
    }

    pub fn for_date(conn: &'c Connection, date: NaiveDate) -> Self {
        let mut provider = Self {
            categories: CategoryStore::new(conn),
            trackers: TrackerStore::new(conn),
            records: RecordStore::new(conn),
            selected_date: date,
            weekday: WeekDay::of(date),
            filter: TrackerFilter::All,
            search: None,
            filtered: Vec::new(),
            visible: Vec::new(),
            observers: ChangeObservers::default(),
        };
        provider.load_categories();
        provider
    }

    // ----- projection ---------------------------------------------------

    /// Show the trackers of `weekday`. The selected date is left as is, so
    /// completion filters keep referring to it.
    pub fn perform_fetch(&mut self, weekday: WeekDay) {
        self.weekday = weekday;
        self.load_categories();
    }

    /// Select a calendar date; its weekday drives the listing.
    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
        self.weekday = WeekDay::of(date);
        debug!(target: "tracker", event = "date_selected", date = %date, weekday = %self.weekday);
        self.load_categories();
    }

    pub fn set_filter(&mut self, filter: TrackerFilter) {
        self.filter = filter;
        if filter == TrackerFilter::Today {
            self.selected_date = today();
            self.weekday = WeekDay::of(self.selected_date);
        }
        debug!(target: "tracker", event = "filter_selected", filter = %filter);
        self.load_categories();
    }

    /// Re-read the stores and rebuild both projections.
    pub fn load_categories(&mut self) {
        let scheduled: HashSet<Uuid> = self
            .trackers
            .fetch_by_day_of_week(self.weekday)
            .into_iter()
            .map(|tracker| tracker.id)
            .collect();
        let filter = self.filter;
        let records = self.records;
        let date = self.selected_date;

        self.filtered = self
            .categories
            .fetch_all()
            .into_iter()
            .filter_map(|category| {
                let trackers: Vec<Tracker> = category
                    .trackers
                    .into_iter()
                    .filter(|tracker| scheduled.contains(&tracker.id))
                    .filter(|tracker| match filter {
                        TrackerFilter::All | TrackerFilter::Today => true,
                        TrackerFilter::Completed => records.exists(&tracker.id, date),
                        TrackerFilter::NotCompleted => !records.exists(&tracker.id, date),
                    })
                    .collect();
                (!trackers.is_empty()).then(|| TrackerCategory::new(category.title, trackers))
            })
            .collect();
        self.refresh_visible();
    }

    /// Narrow the listing to trackers whose name contains `search`
    /// (case-insensitive). `None` or blank text shows everything.
    pub fn filter(&mut self, search: Option<&str>) {
        self.search = search
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase);
        self.refresh_visible();
    }

    fn refresh_visible(&mut self) {
        let next = match &self.search {
            None => self.filtered.clone(),
            Some(needle) => self
                .filtered
                .iter()
                .filter_map(|category| {
                    let trackers: Vec<Tracker> = category
                        .trackers
                        .iter()
                        .filter(|tracker| tracker.name_matches(needle))
                        .cloned()
                        .collect();
                    (!trackers.is_empty())
                        .then(|| TrackerCategory::new(category.title.clone(), trackers))
                })
                .collect(),
        };
        let events = diff(&self.visible, &next);
        self.visible = next;
        self.observers.notify(&events);
    }

    pub fn categories(&self) -> &[TrackerCategory] {
        &self.filtered
    }

    pub fn visible_categories(&self) -> &[TrackerCategory] {
        &self.visible
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn weekday(&self) -> WeekDay {
        self.weekday
    }

    pub fn current_filter(&self) -> TrackerFilter {
        self.filter
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn number_of_sections(&self) -> usize {
        self.visible.len()
    }

    pub fn number_of_items(&self, section: usize) -> usize {
        self.visible.get(section).map_or(0, |category| category.trackers.len())
    }

    pub fn category_title(&self, section: usize) -> Option<&str> {
        self.visible.get(section).map(|category| category.title.as_str())
    }

    pub fn category(&self, section: usize) -> Option<&TrackerCategory> {
        self.visible.get(section)
    }

    pub fn tracker_at(&self, path: IndexPath) -> Option<&Tracker> {
        self.visible.get(path.section)?.trackers.get(path.row)
    }

    // ----- observers ----------------------------------------------------

    pub fn subscribe(&mut self, observer: ChangeObserver) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ----- trackers -----------------------------------------------------

    /// Validate and store a new tracker under an existing category.
    pub fn create_tracker(&mut self, category: &str, tracker: &Tracker) -> AppResult<Tracker> {
        tracker.validate()?;
        ensure_fileable(category)?;
        self.ensure_new(tracker)?;
        let stored = self.trackers.create(tracker, category).ok_or_else(|| {
            AppError::new("CATEGORY/NOT_FOUND", "No category with that title")
                .with_context("title", category)
        })?;
        self.load_categories();
        Ok(stored)
    }

    /// File a tracker under `category`. An unknown title is logged and
    /// ignored.
    pub fn add_tracker(&mut self, category: &str, tracker: &Tracker) -> AppResult<()> {
        tracker.validate()?;
        ensure_fileable(category)?;
        self.ensure_new(tracker)?;
        if self.categories.add_tracker(category, tracker) {
            self.load_categories();
        }
        Ok(())
    }

    fn ensure_new(&self, tracker: &Tracker) -> AppResult<()> {
        if self.trackers.exists(&tracker.id) {
            return Err(AppError::new("TRACKER/DUPLICATE", "A tracker with this id already exists")
                .with_context("tracker_id", tracker.id.to_string()));
        }
        Ok(())
    }

    pub fn update_tracker(&mut self, tracker: &Tracker) -> AppResult<()> {
        tracker.validate()?;
        if self.trackers.update(tracker) {
            self.load_categories();
        }
        Ok(())
    }

    /// Save an edit that may also change the tracker's category.
    pub fn update_tracker_in_category(&mut self, tracker: &Tracker, category: &str) -> AppResult<()> {
        tracker.validate()?;
        ensure_fileable(category)?;
        if self.trackers.recreate_in_category(tracker, category) {
            self.load_categories();
        }
        Ok(())
    }

    pub fn delete_tracker(&mut self, id: &Uuid) {
        if self.trackers.delete(id) {
            self.load_categories();
        }
    }

    pub fn tracker_exists(&self, id: &Uuid) -> bool {
        self.trackers.exists(id)
    }

    /// The stored tracker. A missing id is a programming error upstream and
    /// stops the process.
    pub fn tracker_by_id(&self, id: &Uuid) -> Tracker {
        match self.trackers.fetch_by_id(id) {
            Some(tracker) => tracker,
            None => fatal_missing("TRACKER/NOT_FOUND", "tracker_by_id", id),
        }
    }

    /// Title of the tracker's own category. Missing is fatal, as above.
    pub fn category_name(&self, id: &Uuid) -> String {
        match self.trackers.category_name(id) {
            Some(title) => title,
            None => fatal_missing("CATEGORY/NOT_FOUND", "category_name", id),
        }
    }

    // ----- categories ---------------------------------------------------

    pub fn create_category(&mut self, title: &str) -> AppResult<()> {
        self.categories.create(title)?;
        self.load_categories();
        Ok(())
    }

    pub fn all_category_titles(&self) -> Vec<String> {
        self.categories.all_titles()
    }

    /// Titles a tracker may be filed under ("Pinned" excluded).
    pub fn category_titles_for_picker(&self) -> Vec<String> {
        self.categories.titles_excluding_pinned()
    }

    pub fn category_by_title(&self, title: &str) -> Option<TrackerCategory> {
        self.categories.fetch_by_title(title)
    }

    // ----- pins ---------------------------------------------------------

    pub fn pin(&mut self, id: &Uuid) {
        if self.categories.pin(id) {
            self.load_categories();
        }
    }

    pub fn unpin(&mut self, id: &Uuid) {
        self.categories.remove_from_pinned(id);
        self.load_categories();
    }

    pub fn is_pinned(&self, id: &Uuid) -> bool {
        self.categories.is_pinned(id)
    }

    // ----- records ------------------------------------------------------

    pub fn create_record(&mut self, id: &Uuid, date: NaiveDate) {
        self.records.create(id, date);
        self.load_categories();
    }

    /// Un-mark a day. Deleting a record that does not exist is logged and
    /// otherwise ignored.
    pub fn delete_record(&mut self, id: &Uuid, date: NaiveDate) {
        match self.records.delete(id, date) {
            Ok(()) => self.load_categories(),
            Err(err) if err.is_not_found() => {
                debug!(target: "tracker", event = "record_delete_missing", tracker_id = %id, date = %date);
            }
            Err(err) => {
                warn!(target: "tracker", event = "record_delete_failed", tracker_id = %id, error = %err);
            }
        }
    }

    pub fn record_exists(&self, id: &Uuid, date: NaiveDate) -> bool {
        self.records.exists(id, date)
    }

    pub fn completed_day_count(&self, id: &Uuid) -> u64 {
        self.records.completed_count(id)
    }

    pub fn total_completed_count(&self) -> u64 {
        self.records.total_completed_count()
    }

    /// Mark the tracker done on `date`. An event is finished by its first
    /// completion and is deleted together with its record.
    pub fn complete_tracker(&mut self, id: &Uuid, date: NaiveDate) {
        let Some(tracker) = self.trackers.fetch_by_id(id) else {
            warn!(target: "tracker", event = "complete_missing_tracker", tracker_id = %id);
            return;
        };
        self.records.create(id, date);
        if tracker.kind() == TrackerKind::Event {
            self.trackers.delete(id);
            info!(target: "tracker", event = "event_completed", tracker_id = %id, date = %date);
        }
        self.load_categories();
    }

    pub fn uncomplete_tracker(&mut self, id: &Uuid, date: NaiveDate) {
        self.delete_record(id, date);
    }

    /// Wipe records, trackers and categories.
    pub fn delete_all_data(&mut self) {
        self.records.delete_all();
        self.trackers.delete_all();
        self.categories.delete_all();
        info!(target: "tracker", event = "data_wiped");
        self.load_categories();
    }
}

fn ensure_fileable(category: &str) -> AppResult<()> {
    if category.trim() == PINNED_CATEGORY {
        return Err(AppError::new(
            "CATEGORY/RESERVED",
            "Trackers cannot be filed under the pinned category",
        )
        .with_context("title", category));
    }
    Ok(())
}

fn fatal_missing(code: &str, op: &'static str, id: &Uuid) -> ! {
    let err = AppError::critical(code, format!("{op}: no tracker {id}"))
        .with_context("tracker_id", id.to_string());
    panic!("missing tracker: {err}");
}
