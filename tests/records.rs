#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use std::collections::BTreeSet;

use proptest::prelude::*;
use tracker_lib::categories::CategoryStore;
use tracker_lib::model::WeekDay;
use tracker_lib::provider::DataProvider;
use tracker_lib::records::RecordStore;
use util::{habit, memory_db, monday};

#[test]
fn record_lifecycle_through_the_facade() {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Home").unwrap();
    let run = provider
        .create_tracker("Home", &habit("Run", &[WeekDay::Monday]))
        .unwrap();

    provider.create_record(&run.id, monday());
    assert!(provider.record_exists(&run.id, monday()));
    assert_eq!(provider.completed_day_count(&run.id), 1);

    provider.delete_record(&run.id, monday());
    assert!(!provider.record_exists(&run.id, monday()));
    // A second delete is a logged no-op.
    provider.delete_record(&run.id, monday());
    assert_eq!(provider.total_completed_count(), 0);
}

#[test]
fn totals_sum_over_trackers() {
    let db = memory_db();
    let categories = CategoryStore::new(db.conn());
    let records = RecordStore::new(db.conn());
    categories.create("Home").unwrap();
    let a = habit("A", &[WeekDay::Monday]);
    let b = habit("B", &[WeekDay::Tuesday]);
    categories.add_tracker("Home", &a);
    categories.add_tracker("Home", &b);

    for offset in 0..3 {
        records.create(&a.id, monday() + chrono::Days::new(offset * 7));
    }
    records.create(&b.id, monday());

    assert_eq!(records.completed_count(&a.id), 3);
    assert_eq!(records.completed_count(&b.id), 1);
    assert_eq!(records.total_completed_count(), 4);

    records.delete_all();
    assert_eq!(records.total_completed_count(), 0);
}

proptest! {
    #[test]
    fn completed_count_equals_distinct_days(offsets in prop::collection::vec(0u64..60, 0..40)) {
        let db = memory_db();
        let categories = CategoryStore::new(db.conn());
        let records = RecordStore::new(db.conn());
        categories.create("Home").unwrap();
        let tracker = habit("Read", &[WeekDay::Sunday]);
        categories.add_tracker("Home", &tracker);

        for offset in &offsets {
            records.create(&tracker.id, monday() + chrono::Days::new(*offset));
        }

        let distinct: BTreeSet<u64> = offsets.iter().copied().collect();
        prop_assert_eq!(records.completed_count(&tracker.id), distinct.len() as u64);
        prop_assert_eq!(records.total_completed_count(), distinct.len() as u64);
    }
}
