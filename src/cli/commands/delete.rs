//! Delete command implementation.

use super::open_store;
use crate::cli::DeleteArgs;
use crate::config;
use crate::error::Result;
use crate::format::print_json;
use crate::model::EntityRef;
use crate::util::short_id;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// JSON output for delete.
#[derive(Serialize)]
struct DeleteResult {
    id: Uuid,
    title: String,
}

/// Execute the delete command.
///
/// Issues are resolved up front so an unknown id deletes nothing.
///
/// # Errors
///
/// Returns an error if an issue is not found or the delete fails.
pub fn execute(args: &DeleteArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    controller.restore_selection()?;

    let issues = args
        .ids
        .iter()
        .map(|id| controller.resolve_issue(id))
        .collect::<Result<Vec<_>>>()?;

    let mut deleted = Vec::with_capacity(issues.len());
    for issue in issues {
        controller.delete(EntityRef::from(&issue))?;
        info!(id = %issue.id, actor = %ctx.actor, "Deleted issue");
        deleted.push(DeleteResult {
            id: issue.id,
            title: issue.title,
        });
    }
    controller.persist_selection()?;

    if json {
        return print_json(&deleted);
    }
    println!("Deleted {} issue(s):", deleted.len());
    for result in &deleted {
        println!("  - {} {}", short_id(&result.id), result.title);
    }
    Ok(())
}
