//! Delete-all command implementation.

use super::open_store;
use crate::cli::DeleteAllArgs;
use crate::config;
use crate::error::{Result, TrackerError};
use crate::format::print_json;
use tracing::warn;

/// Execute the delete-all command.
///
/// # Errors
///
/// Returns a validation error without `--yes`, or the delete error.
pub fn execute(args: &DeleteAllArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    if !args.yes {
        return Err(TrackerError::validation(
            "yes",
            "delete-all removes every issue and tag; pass --yes to confirm",
        ));
    }

    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    controller.restore_selection()?;

    let summary = controller.delete_all()?;
    controller.persist_selection()?;
    warn!(
        tags = summary.tags.len(),
        issues = summary.issues.len(),
        actor = %ctx.actor,
        "Deleted all data"
    );

    if json {
        return print_json(&summary);
    }
    println!(
        "Deleted {} tag(s) and {} issue(s)",
        summary.tags.len(),
        summary.issues.len()
    );
    Ok(())
}
