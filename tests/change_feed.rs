//! Change notifications across two sessions sharing one database file.

mod common;

use common::shared_controllers;
use ultimate_portfolio::StoreChange;
use ultimate_portfolio::model::Filter;

#[test]
fn remote_commit_is_reported_exactly_once() {
    let (mut writer, mut reader, _dir) = shared_controllers();
    let feed = reader.subscribe();

    writer.create_issue("From elsewhere").unwrap();
    assert_eq!(reader.poll_remote_changes().unwrap(), 0, "uncommitted work is invisible");
    assert!(reader.current_issues(&Filter::all()).is_empty());

    writer.save().unwrap();
    assert_eq!(reader.poll_remote_changes().unwrap(), 1);
    assert_eq!(reader.poll_remote_changes().unwrap(), 0);

    let events: Vec<_> = feed.try_iter().collect();
    assert_eq!(events, vec![StoreChange::RemoteChange]);
    assert_eq!(reader.current_issues(&Filter::all()).len(), 1);
}

#[test]
fn own_commits_are_not_remote() {
    let (mut writer, _reader, _dir) = shared_controllers();
    let feed = writer.subscribe();

    writer.create_tag("Mine").unwrap();
    writer.save().unwrap();

    assert_eq!(writer.poll_remote_changes().unwrap(), 0);
    assert!(!feed.try_iter().any(|c| c == StoreChange::RemoteChange));
}

#[test]
fn several_remote_commits_coalesce_into_one_notification() {
    let (mut writer, mut reader, _dir) = shared_controllers();
    let feed = reader.subscribe();

    for title in ["One", "Two", "Three"] {
        writer.create_issue(title).unwrap();
        writer.save().unwrap();
    }

    assert_eq!(reader.poll_remote_changes().unwrap(), 3);
    assert_eq!(feed.try_iter().count(), 1);
}

#[test]
fn save_notifies_local_subscribers_with_change_count() {
    let (mut writer, _reader, _dir) = shared_controllers();
    let feed = writer.subscribe();

    let issue = writer.create_issue("Counted").unwrap();
    let tag = writer.create_tag("Counted").unwrap();
    writer.add_tag(&issue.id, &tag.id).unwrap();
    assert!(writer.save().unwrap());
    assert!(!writer.save().unwrap());

    // Two inserts plus a link recorded on each side.
    assert_eq!(
        feed.try_iter().collect::<Vec<_>>(),
        vec![StoreChange::Saved { changes: 4 }]
    );
}

#[test]
fn discarded_changes_never_reach_other_sessions() {
    let (mut writer, mut reader, _dir) = shared_controllers();

    writer.create_issue("Abandoned").unwrap();
    assert_eq!(writer.discard_changes().unwrap(), 1);

    writer.create_issue("Kept").unwrap();
    writer.save().unwrap();

    assert_eq!(reader.poll_remote_changes().unwrap(), 1);
    let titles: Vec<_> = reader
        .current_issues(&Filter::all())
        .into_iter()
        .map(|i| i.title)
        .collect();
    assert_eq!(titles, vec!["Kept"]);
}

#[test]
fn no_op_mutation_leaves_no_write_lock_behind() {
    let (mut first, mut second, _dir) = shared_controllers();
    let issue = first.create_issue("Linked").unwrap();
    let tag = first.create_tag("Linked").unwrap();
    first.add_tag(&issue.id, &tag.id).unwrap();
    first.save().unwrap();

    assert!(!first.add_tag(&issue.id, &tag.id).unwrap());
    assert!(!first.remove_tag(&issue.id, &uuid::Uuid::new_v4()).unwrap());
    assert!(!first.has_changes());

    // The other session can write while the first one sits idle.
    second.create_issue("Elsewhere").unwrap();
    assert!(second.save().unwrap());

    first.set_selected_filter(Filter::for_tag(tag.clone()));
    first.persist_selection().unwrap();
    assert!(!first.save().unwrap());
    assert_eq!(
        first.storage().get_metadata("selected_filter").unwrap(),
        Some(tag.id.to_string())
    );
}

#[test]
fn empty_delete_all_does_not_block_other_sessions() {
    let (mut first, mut second, _dir) = shared_controllers();
    assert_eq!(first.delete_all().unwrap().total(), 0);

    second.create_tag("After").unwrap();
    assert!(second.save().unwrap());
}
