//! Structural change events for sectioned listings.
//!
//! The provider recomputes its visible projection after every mutation and
//! reports the difference to subscribers as a batch of section/row events,
//! the same shape a table view applies in one batch update. Old positions
//! refer to the previous projection, new positions to the current one.
//! Deletions, updates and a move's `from` use old positions; insertions and
//! a move's `to` use new ones.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::model::{Tracker, TrackerCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    SectionInserted { section: usize },
    SectionDeleted { section: usize },
    RowInserted { path: IndexPath },
    RowDeleted { path: IndexPath },
    RowMoved { from: IndexPath, to: IndexPath },
    /// Content changed in place. `path` is the row's old position.
    RowUpdated { path: IndexPath },
}

pub type ChangeObserver = Arc<dyn Fn(&[ChangeEvent]) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers in subscription order.
#[derive(Default)]
pub struct ChangeObservers {
    next: u64,
    entries: Vec<(SubscriptionId, ChangeObserver)>,
}

impl ChangeObservers {
    pub fn subscribe(&mut self, observer: ChangeObserver) -> SubscriptionId {
        self.next += 1;
        let id = SubscriptionId(self.next);
        self.entries.push((id, observer));
        id
    }

    /// Returns false when the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver a batch. Empty batches are dropped.
    pub fn notify(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        for (_, observer) in &self.entries {
            observer(events);
        }
    }
}

/// Compute the events that turn `old` into `new`.
///
/// Sections are identified by title, rows by tracker id. Rows inside an
/// inserted or deleted section are covered by the section event. A tracker
/// that changes section between two surviving sections is a move; a tracker
/// that stays in its section with changed content is an update.
pub fn diff(old: &[TrackerCategory], new: &[TrackerCategory]) -> Vec<ChangeEvent> {
    let old_sections: HashMap<&str, usize> = index_titles(old);
    let new_sections: HashMap<&str, usize> = index_titles(new);

    let mut section_events = Vec::new();
    for (index, category) in old.iter().enumerate() {
        if !new_sections.contains_key(category.title.as_str()) {
            section_events.push(ChangeEvent::SectionDeleted { section: index });
        }
    }
    for (index, category) in new.iter().enumerate() {
        if !old_sections.contains_key(category.title.as_str()) {
            section_events.push(ChangeEvent::SectionInserted { section: index });
        }
    }

    // Rows of sections present on both sides.
    let old_rows = surviving_rows(old, &new_sections);
    let new_rows = surviving_rows(new, &old_sections);

    let mut deleted = Vec::new();
    let mut inserted = Vec::new();
    let mut moved = Vec::new();
    let mut updated = Vec::new();

    for (id, (from, before)) in &old_rows {
        match new_rows.get(id) {
            None => deleted.push(ChangeEvent::RowDeleted { path: *from }),
            Some((to, _)) if old[from.section].title != new[to.section].title => {
                moved.push(ChangeEvent::RowMoved { from: *from, to: *to })
            }
            Some((_, after)) if before != after => {
                updated.push(ChangeEvent::RowUpdated { path: *from })
            }
            Some(_) => {}
        }
    }
    for (id, (to, _)) in &new_rows {
        if !old_rows.contains_key(id) {
            inserted.push(ChangeEvent::RowInserted { path: *to });
        }
    }

    deleted.sort_by_key(event_path);
    inserted.sort_by_key(event_path);
    moved.sort_by_key(event_path);
    updated.sort_by_key(event_path);

    let mut events = section_events;
    events.extend(deleted);
    events.extend(inserted);
    events.extend(moved);
    events.extend(updated);
    events
}

fn index_titles(categories: &[TrackerCategory]) -> HashMap<&str, usize> {
    categories
        .iter()
        .enumerate()
        .map(|(index, category)| (category.title.as_str(), index))
        .collect()
}

fn surviving_rows<'a>(
    side: &'a [TrackerCategory],
    other: &HashMap<&str, usize>,
) -> HashMap<Uuid, (IndexPath, &'a Tracker)> {
    let mut rows = HashMap::new();
    for (section, category) in side.iter().enumerate() {
        if !other.contains_key(category.title.as_str()) {
            continue;
        }
        for (row, tracker) in category.trackers.iter().enumerate() {
            rows.insert(tracker.id, (IndexPath::new(section, row), tracker));
        }
    }
    rows
}

fn event_path(event: &ChangeEvent) -> IndexPath {
    match event {
        ChangeEvent::RowInserted { path }
        | ChangeEvent::RowDeleted { path }
        | ChangeEvent::RowUpdated { path } => *path,
        ChangeEvent::RowMoved { from, .. } => *from,
        ChangeEvent::SectionInserted { section } | ChangeEvent::SectionDeleted { section } => {
            IndexPath::new(*section, 0)
        }
    }
}
