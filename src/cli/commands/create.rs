//! Create command implementation.

use super::{open_store, parse_priority};
use crate::cli::CreateArgs;
use crate::config;
use crate::error::Result;
use crate::format::{format_issue_line, print_json};
use crate::model::IssueUpdate;
use tracing::info;

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if the priority or a tag is invalid, or the store fails.
pub fn execute(args: &CreateArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;

    // Resolve everything before staging so a bad tag leaves nothing behind.
    let priority = parse_priority(args.priority.as_deref())?;
    let tags = args
        .tags
        .iter()
        .map(|tag| controller.resolve_tag(tag))
        .collect::<Result<Vec<_>>>()?;

    let issue = controller.create_issue(args.title.as_deref().unwrap_or_default())?;
    let updates = IssueUpdate {
        content: args.content.clone(),
        priority,
        ..IssueUpdate::default()
    };
    if !updates.is_empty() {
        controller.update_issue(&issue.id, &updates)?;
    }
    for tag in &tags {
        controller.add_tag(&issue.id, &tag.id)?;
    }
    controller.save()?;

    let issue = controller.issue(&issue.id)?.unwrap_or(issue);
    info!(id = %issue.id, actor = %ctx.actor, "Created issue");

    if json {
        print_json(&issue)?;
    } else {
        println!("Created {}", format_issue_line(&issue));
    }
    Ok(())
}
