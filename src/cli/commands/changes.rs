//! Changes command implementation.

use super::open_store;
use crate::cli::ChangesArgs;
use crate::config;
use crate::controller::StoreChange;
use crate::error::Result;
use crate::format::print_json;
use crate::storage::ChangeRecord;
use crate::util::short_id;
use crate::util::time::format_timestamp;
use std::thread;
use std::time::Duration;
use tracing::debug;

fn format_change(change: &ChangeRecord) -> String {
    format!(
        "{:>6} {} {:<5} {} {}",
        change.seq,
        format_timestamp(&change.created_at),
        change.entity.as_str(),
        short_id(&change.entity_id),
        change.kind
    )
}

fn print_changes(changes: &[ChangeRecord], json: bool) -> Result<()> {
    if json {
        for change in changes {
            println!("{}", serde_json::to_string(change)?);
        }
        return Ok(());
    }
    for change in changes {
        println!("{}", format_change(change));
    }
    Ok(())
}

/// Sequence number to continue watching from: the last row printed, so the
/// rest of a page cut short by `--limit` follows with the next remote change.
fn resume_after(printed: &[ChangeRecord], since: i64) -> i64 {
    printed.last().map_or(since, |change| change.seq)
}

/// Execute the changes command.
///
/// With `--watch`, keeps polling and prints changes committed by other
/// sessions as they arrive. JSON output is one object per line.
///
/// # Errors
///
/// Returns an error if the change log cannot be read.
pub fn execute(args: &ChangesArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;

    let changes = controller.storage().changes_since(args.since, args.limit)?;
    if !args.watch {
        if json {
            return print_json(&changes);
        }
        if changes.is_empty() {
            println!("No changes.");
        }
        return print_changes(&changes, false);
    }

    print_changes(&changes, json)?;
    let mut last_printed = resume_after(&changes, args.since);

    let feed = controller.subscribe();
    loop {
        thread::sleep(Duration::from_millis(args.interval_ms));
        controller.poll_remote_changes()?;

        if feed
            .try_iter()
            .any(|change| change == StoreChange::RemoteChange)
        {
            let fresh = controller.storage().changes_since(last_printed, None)?;
            debug!(count = fresh.len(), "Printing remote changes");
            if let Some(last) = fresh.last() {
                last_printed = last.seq;
            }
            print_changes(&fresh, json)?;
        }
    }
}
