//! Filter and selection behavior of `StoreController`.

mod common;

use chrono::{Duration, Utc};
use common::fixtures::{self, IssueBuilder};
use common::{test_controller, test_db, test_log};
use ultimate_portfolio::model::{ALL_FILTER_ID, Filter};
use ultimate_portfolio::{StoreChange, StoreController, TrackerError};

fn titles(issues: &[ultimate_portfolio::model::Issue]) -> Vec<&str> {
    issues.iter().map(|i| i.title.as_str()).collect()
}

#[test]
fn all_filter_returns_every_issue_in_title_order() {
    let _log = test_log("all_filter_returns_every_issue_in_title_order");
    let mut controller = test_controller();
    for title in ["Charlie", "alpha", "Bravo"] {
        controller.create_issue(title).unwrap();
    }
    controller.save().unwrap();

    let issues = controller.current_issues(&Filter::all());
    assert_eq!(titles(&issues), vec!["Bravo", "Charlie", "alpha"]);
}

#[test]
fn equal_titles_order_by_creation_time() {
    let mut storage = test_db();
    let base = fixtures::base_time();
    let newer = IssueBuilder::new("Same").created_at(base + Duration::hours(1)).build();
    let older = IssueBuilder::new("Same").created_at(base).build();
    storage.create_issue(&newer).unwrap();
    storage.create_issue(&older).unwrap();
    storage.save().unwrap();

    let controller = StoreController::new(storage).unwrap();
    let ids: Vec<_> = controller
        .current_issues(&Filter::all())
        .iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![older.id, newer.id]);
}

#[test]
fn recent_filter_uses_strict_threshold() {
    let mut storage = test_db();
    let now = Utc::now();
    let threshold = now - Duration::days(7);

    let fresh = IssueBuilder::new("Fresh").modified_days_ago(1).build();
    let stale = IssueBuilder::new("Stale").modified_days_ago(30).build();
    let boundary = IssueBuilder::new("Boundary").modified_at(threshold).build();
    for issue in [&fresh, &stale, &boundary] {
        storage.create_issue(issue).unwrap();
    }
    storage.save().unwrap();

    let controller = StoreController::new(storage).unwrap();
    let filter = Filter::recent_at(now, 7);
    assert_eq!(filter.min_modification_date, threshold);

    let issues = controller.current_issues(&filter);
    assert_eq!(titles(&issues), vec!["Fresh"]);
}

#[test]
fn recent_filter_moves_with_its_reference_time() {
    let mut storage = test_db();
    let at = fixtures::base_time();
    storage
        .create_issue(&IssueBuilder::new("Then").created_at(at).build())
        .unwrap();
    storage.save().unwrap();

    let controller = StoreController::new(storage).unwrap();
    assert_eq!(controller.current_issues(&Filter::recent_at(at, 7)).len(), 1);
    let later = at + Duration::days(8);
    assert!(controller.current_issues(&Filter::recent_at(later, 7)).is_empty());
}

#[test]
fn recent_window_is_configurable() {
    let mut storage = test_db();
    storage
        .create_issue(&IssueBuilder::new("Two days").modified_days_ago(2).build())
        .unwrap();
    storage.save().unwrap();

    let narrow = StoreController::new(storage).unwrap().with_recent_days(1);
    assert!(narrow.current_issues(&narrow.recent_filter()).is_empty());
}

#[test]
fn tag_filter_ignores_modification_threshold() {
    let mut storage = test_db();
    let tag = fixtures::tag("Old work");
    let old = IssueBuilder::new("Ancient").modified_days_ago(365).build();
    let other = fixtures::issue("Untagged");
    storage.create_tag(&tag).unwrap();
    storage.create_issue(&old).unwrap();
    storage.create_issue(&other).unwrap();
    storage
        .add_tag_to_issue(&old.id, &tag.id, old.modified_at)
        .unwrap();
    storage.save().unwrap();

    let controller = StoreController::new(storage).unwrap();
    let filter = Filter::for_tag(tag).modified_after(Utc::now());
    let issues = controller.current_issues(&filter);
    assert_eq!(titles(&issues), vec!["Ancient"]);
    assert_eq!(issues[0].tags.len(), 1);
}

#[test]
fn issue_with_several_tags_appears_in_each_tag_filter() {
    let mut controller = test_controller();
    let issue = controller.create_issue("Shared").unwrap();
    let a = controller.create_tag("A").unwrap();
    let b = controller.create_tag("B").unwrap();
    controller.add_tag(&issue.id, &a.id).unwrap();
    controller.add_tag(&issue.id, &b.id).unwrap();
    controller.save().unwrap();

    for tag in [a, b] {
        let issues = controller.current_issues(&Filter::for_tag(tag));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, issue.id);
    }
}

#[test]
fn missing_tags_excludes_associated_tags() {
    let mut controller = test_controller();
    let issue = controller.create_issue("Partial").unwrap();
    let attached = controller.create_tag("Attached").unwrap();
    let free_b = controller.create_tag("b").unwrap();
    let free_a = controller.create_tag("a").unwrap();
    controller.add_tag(&issue.id, &attached.id).unwrap();
    controller.save().unwrap();

    let missing = controller.missing_tags(&issue.id).unwrap();
    assert_eq!(missing, vec![free_a, free_b]);
}

#[test]
fn selection_changes_publish_once() {
    let mut controller = test_controller();
    let feed = controller.subscribe();
    let tag = controller.create_tag("Focus").unwrap();
    controller.save().unwrap();
    let _ = feed.try_iter().count();

    assert!(controller.set_selected_filter(Filter::for_tag(tag.clone())));
    assert!(!controller.set_selected_filter(Filter::for_tag(tag)));
    assert_eq!(
        feed.try_iter().collect::<Vec<_>>(),
        vec![StoreChange::SelectionChanged]
    );
}

#[test]
fn selection_survives_a_new_controller() {
    let (db_path, _dir) = common::test_db_path();
    let open = || {
        StoreController::new(ultimate_portfolio::storage::SqliteStorage::open(&db_path).unwrap())
            .unwrap()
    };

    let (tag_id, issue_id) = {
        let mut controller = open();
        let tag = controller.create_tag("Pinned").unwrap();
        let issue = controller.create_issue("Chosen").unwrap();
        controller.save().unwrap();
        controller.set_selected_filter(Filter::for_tag(tag.clone()));
        controller.set_selected_issue(Some(issue.clone()));
        controller.persist_selection().unwrap();
        (tag.id, issue.id)
    };

    let mut controller = open();
    assert_eq!(controller.selected_filter().id, ALL_FILTER_ID);
    controller.restore_selection().unwrap();
    assert_eq!(controller.selected_filter().id, tag_id);
    assert_eq!(controller.selected_issue().map(|i| i.id), Some(issue_id));
}

#[test]
fn resolve_filter_parses_known_forms() {
    let mut controller = test_controller();
    let tag = controller.create_tag("Home").unwrap();
    controller.save().unwrap();

    assert_eq!(controller.resolve_filter("all").unwrap(), Filter::all());
    assert_eq!(controller.resolve_filter("Recent").unwrap(), Filter::recent());
    assert_eq!(
        controller.resolve_filter("tag:Home").unwrap(),
        Filter::for_tag(tag)
    );
    assert!(controller.resolve_filter("starred").is_err());
}

#[test]
fn corrupt_row_yields_empty_issue_list() {
    let mut storage = test_db();
    let broken = fixtures::issue("Broken");
    storage.create_issue(&broken).unwrap();
    storage.create_issue(&fixtures::issue("Fine")).unwrap();
    storage.save().unwrap();
    storage
        .execute_test_sql(&format!(
            "UPDATE issues SET modified_at = 'garbage' WHERE id = '{}'",
            broken.id
        ))
        .unwrap();

    let controller = StoreController::new(storage).unwrap();
    assert!(controller.current_issues(&Filter::all()).is_empty());
    assert!(matches!(
        controller.try_current_issues(&Filter::all()),
        Err(TrackerError::CorruptRecord { .. })
    ));
}
