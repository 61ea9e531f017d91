#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use anyhow::Result;
use tracker_lib::changes::IndexPath;
use tracker_lib::model::{TrackerColor, WeekDay};
use tracker_lib::provider::{DataProvider, TrackerFilter};
use util::{day_of_week, event, habit, memory_db, monday, names, titles};

/// Home: [Apple, Banana], Work: [Cherry], all scheduled on Mondays.
fn seeded(provider: &mut DataProvider<'_>) -> Result<()> {
    provider.create_category("Home")?;
    provider.create_category("Work")?;
    provider.create_tracker("Home", &habit("Apple", &[WeekDay::Monday]))?;
    provider.create_tracker("Home", &habit("Banana", &[WeekDay::Monday]))?;
    provider.create_tracker("Work", &habit("Cherry", &[WeekDay::Monday]))?;
    Ok(())
}

#[test]
fn sections_and_rows_follow_visible_categories() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;

    assert_eq!(provider.number_of_sections(), 2);
    assert_eq!(provider.number_of_items(0), 2);
    assert_eq!(provider.number_of_items(1), 1);
    assert_eq!(provider.number_of_items(7), 0);
    assert_eq!(provider.category_title(1), Some("Work"));
    assert_eq!(provider.category_title(2), None);
    let banana = provider.tracker_at(IndexPath::new(0, 1)).unwrap();
    assert_eq!(banana.name, "Banana");
    assert!(provider.tracker_at(IndexPath::new(1, 3)).is_none());
    Ok(())
}

#[test]
fn search_narrows_case_insensitively_and_resets() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;

    provider.filter(Some("b"));
    assert_eq!(titles(provider.visible_categories()), vec!["Home"]);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Banana"]);
    // The unsearched projection is untouched.
    assert_eq!(provider.categories().len(), 2);

    provider.filter(Some("CHER"));
    assert_eq!(titles(provider.visible_categories()), vec!["Work"]);

    provider.filter(Some("   "));
    assert_eq!(provider.visible_categories(), provider.categories());
    provider.filter(None);
    assert_eq!(provider.visible_categories(), provider.categories());
    Ok(())
}

#[test]
fn selecting_a_date_applies_weekday_filter() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Home")?;
    provider.create_tracker("Home", &habit("Gym", &[WeekDay::Wednesday]))?;
    provider.create_tracker("Home", &event("Dentist"))?;

    assert_eq!(names(&provider.visible_categories()[0]), vec!["Dentist"]);

    provider.select_date(day_of_week(WeekDay::Wednesday));
    assert_eq!(provider.weekday(), WeekDay::Wednesday);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Gym", "Dentist"]);

    provider.perform_fetch(WeekDay::Sunday);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Dentist"]);
    Ok(())
}

#[test]
fn categories_without_visible_trackers_are_hidden() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Empty")?;
    provider.create_category("Home")?;
    provider.create_tracker("Home", &habit("Tue", &[WeekDay::Tuesday]))?;

    assert_eq!(provider.number_of_sections(), 0);
    assert_eq!(provider.all_category_titles(), vec!["Empty", "Home"]);
    Ok(())
}

#[test]
fn pin_then_unpin_restores_listing() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;
    let before = provider.visible_categories().to_vec();
    let cherry = provider.tracker_at(IndexPath::new(1, 0)).unwrap().clone();

    provider.pin(&cherry.id);
    assert!(provider.is_pinned(&cherry.id));
    assert_eq!(titles(provider.visible_categories()), vec!["Pinned", "Home"]);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Cherry"]);
    // Membership is unchanged underneath the overlay.
    assert_eq!(provider.category_name(&cherry.id), "Work");
    assert_eq!(names(&provider.category_by_title("Work").unwrap()), vec!["Cherry"]);

    provider.unpin(&cherry.id);
    assert!(!provider.is_pinned(&cherry.id));
    assert!(provider.category_by_title("Pinned").is_none());
    assert_eq!(provider.visible_categories(), before.as_slice());
    Ok(())
}

#[test]
fn pinned_category_is_not_offered_for_filing() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;
    let apple = provider.tracker_at(IndexPath::new(0, 0)).unwrap().clone();
    provider.pin(&apple.id);

    assert_eq!(provider.category_titles_for_picker(), vec!["Home", "Work"]);
    let err = provider
        .create_tracker("Pinned", &habit("Nope", &[WeekDay::Monday]))
        .unwrap_err();
    assert_eq!(err.code(), "CATEGORY/RESERVED");
    assert_eq!(provider.create_category("Pinned").unwrap_err().code(), "CATEGORY/RESERVED");
    Ok(())
}

#[test]
fn invalid_trackers_are_rejected() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Home")?;

    let blank = habit("   ", &[WeekDay::Monday]);
    assert_eq!(
        provider.create_tracker("Home", &blank).unwrap_err().code(),
        "VALIDATION/EMPTY_NAME"
    );
    let mut odd = habit("Odd", &[WeekDay::Monday]);
    odd.emoji = "🚀".into();
    assert_eq!(
        provider.create_tracker("Home", &odd).unwrap_err().code(),
        "VALIDATION/UNKNOWN_EMOJI"
    );
    let missing = provider
        .create_tracker("Nowhere", &habit("Lost", &[WeekDay::Monday]))
        .unwrap_err();
    assert_eq!(missing.code(), "CATEGORY/NOT_FOUND");
    assert_eq!(provider.create_category("Home").unwrap_err().code(), "CATEGORY/DUPLICATE");
    Ok(())
}

#[test]
fn add_tracker_to_unknown_category_is_ignored() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    let lost = habit("Lost", &[WeekDay::Monday]);
    provider.add_tracker("Nowhere", &lost)?;
    assert!(!provider.tracker_exists(&lost.id));
    Ok(())
}

#[test]
fn completion_filters_use_selected_date() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;
    let apple = provider.tracker_at(IndexPath::new(0, 0)).unwrap().clone();
    provider.complete_tracker(&apple.id, monday());

    provider.set_filter(TrackerFilter::Completed);
    assert_eq!(titles(provider.visible_categories()), vec!["Home"]);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Apple"]);

    provider.set_filter(TrackerFilter::NotCompleted);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Banana"]);
    assert_eq!(names(&provider.visible_categories()[1]), vec!["Cherry"]);

    provider.set_filter(TrackerFilter::All);
    assert_eq!(provider.number_of_sections(), 2);

    provider.set_filter(TrackerFilter::Today);
    assert_eq!(provider.selected_date(), tracker_lib::time::today());
    Ok(())
}

#[test]
fn completing_an_event_removes_it() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Home")?;
    provider.create_tracker("Home", &habit("Keep", &[WeekDay::Monday]))?;
    let once = provider.create_tracker("Home", &event("Once"))?;

    provider.complete_tracker(&once.id, monday());

    assert!(!provider.tracker_exists(&once.id));
    assert!(!provider.record_exists(&once.id, monday()));
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Keep"]);
    Ok(())
}

#[test]
fn uncomplete_removes_the_days_record() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;
    let apple = provider.tracker_at(IndexPath::new(0, 0)).unwrap().clone();

    provider.complete_tracker(&apple.id, monday());
    assert_eq!(provider.completed_day_count(&apple.id), 1);
    provider.uncomplete_tracker(&apple.id, monday());
    assert_eq!(provider.completed_day_count(&apple.id), 0);
    assert!(provider.tracker_exists(&apple.id));
    Ok(())
}

#[test]
fn edit_can_move_tracker_to_another_category() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    seeded(&mut provider)?;
    let mut apple = provider.tracker_at(IndexPath::new(0, 0)).unwrap().clone();
    provider.create_record(&apple.id, monday());

    apple.name = "Green apple".into();
    apple.color = TrackerColor::Emerald;
    provider.update_tracker_in_category(&apple, "Work")?;

    assert_eq!(provider.category_name(&apple.id), "Work");
    let stored = provider.tracker_by_id(&apple.id);
    assert_eq!(stored, apple);
    assert_eq!(provider.completed_day_count(&apple.id), 1);
    assert_eq!(names(&provider.visible_categories()[1]), vec!["Cherry", "Green apple"]);

    // Same category: plain in-place update.
    apple.name = "Apple".into();
    provider.update_tracker_in_category(&apple, "Work")?;
    assert_eq!(provider.tracker_by_id(&apple.id).name, "Apple");
    Ok(())
}

#[test]
#[should_panic(expected = "missing tracker")]
fn tracker_by_unknown_id_is_fatal() {
    let db = memory_db();
    let provider = DataProvider::for_date(db.conn(), monday());
    provider.tracker_by_id(&uuid::Uuid::new_v4());
}

#[test]
#[should_panic(expected = "missing tracker")]
fn category_name_of_unknown_id_is_fatal() {
    let db = memory_db();
    let provider = DataProvider::for_date(db.conn(), monday());
    provider.category_name(&uuid::Uuid::new_v4());
}

#[test]
fn resubmitting_a_tracker_id_is_rejected() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category("Home")?;
    provider.create_category("Work")?;
    let run = habit("Run", &[WeekDay::Monday]);
    provider.create_tracker("Home", &run)?;

    let err = provider.create_tracker("Home", &run).unwrap_err();
    assert_eq!(err.code(), "TRACKER/DUPLICATE");
    let err = provider.add_tracker("Work", &run).unwrap_err();
    assert_eq!(err.code(), "TRACKER/DUPLICATE");

    assert_eq!(titles(provider.visible_categories()), vec!["Home"]);
    assert_eq!(names(&provider.visible_categories()[0]), vec!["Run"]);
    assert_eq!(provider.category_name(&run.id), "Home");
    Ok(())
}

#[test]
fn padded_category_titles_resolve_to_the_stored_title() -> Result<()> {
    let db = memory_db();
    let mut provider = DataProvider::for_date(db.conn(), monday());
    provider.create_category(" Home ")?;
    assert_eq!(provider.all_category_titles(), vec!["Home"]);

    let run = provider.create_tracker(" Home ", &habit("Run", &[WeekDay::Monday]))?;
    assert_eq!(provider.category_name(&run.id), "Home");
    assert!(provider.category_by_title("  Home").is_some());
    assert_eq!(
        provider.create_category("Home ").unwrap_err().code(),
        "CATEGORY/DUPLICATE"
    );
    assert_eq!(
        provider.create_tracker(" Pinned ", &habit("Walk", &[])).unwrap_err().code(),
        "CATEGORY/RESERVED"
    );
    Ok(())
}
