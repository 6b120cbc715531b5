//! Tag command implementation.
//!
//! Provides tag management: create, delete, add, remove, list and missing.

use super::open_store;
use crate::cli::TagCommands;
use crate::config;
use crate::controller::StoreController;
use crate::error::Result;
use crate::format::{format_tag_line, print_json};
use crate::model::{EntityRef, Filter, Tag};
use crate::util::short_id;
use serde::Serialize;
use tracing::{debug, info};

/// JSON output for tag add/remove operations.
#[derive(Serialize)]
struct TagActionResult {
    status: &'static str,
    issue_id: String,
    tag: Tag,
}

/// JSON output for list.
#[derive(Serialize)]
struct TagCount {
    #[serde(flatten)]
    tag: Tag,
    count: usize,
}

/// Execute the tag command.
///
/// # Errors
///
/// Returns an error if a tag or issue cannot be resolved or the store fails.
pub fn execute(command: &TagCommands, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    debug!(actor = %ctx.actor, ?command, "Tag command");

    match command {
        TagCommands::Create { name } => tag_create(controller, name, json),
        TagCommands::Delete { tag } => tag_delete(controller, tag, json),
        TagCommands::Add { issue, tag } => tag_link(controller, issue, tag, true, json),
        TagCommands::Remove { issue, tag } => tag_link(controller, issue, tag, false, json),
        TagCommands::List => tag_list(controller, json),
        TagCommands::Missing { issue } => tag_missing(controller, issue, json),
    }
}

fn tag_create(controller: &mut StoreController, name: &str, json: bool) -> Result<()> {
    let tag = controller.create_tag(name)?;
    controller.save()?;
    info!(id = %tag.id, name = %tag.name, "Created tag");

    if json {
        return print_json(&tag);
    }
    println!("Created tag {}", format_tag_line(&tag, None));
    Ok(())
}

fn tag_delete(controller: &mut StoreController, input: &str, json: bool) -> Result<()> {
    controller.restore_selection()?;
    let tag = controller.resolve_tag(input)?;
    controller.delete(EntityRef::from(&tag))?;
    controller.persist_selection()?;
    info!(id = %tag.id, name = %tag.name, "Deleted tag");

    if json {
        return print_json(&tag);
    }
    println!("Deleted tag {}", format_tag_line(&tag, None));
    Ok(())
}

fn tag_link(
    controller: &mut StoreController,
    issue_input: &str,
    tag_input: &str,
    attach: bool,
    json: bool,
) -> Result<()> {
    let issue = controller.resolve_issue(issue_input)?;
    let tag = controller.resolve_tag(tag_input)?;

    let changed = if attach {
        controller.add_tag(&issue.id, &tag.id)?
    } else {
        controller.remove_tag(&issue.id, &tag.id)?
    };
    controller.save()?;

    let status = match (attach, changed) {
        (true, true) => "added",
        (true, false) => "exists",
        (false, true) => "removed",
        (false, false) => "not_found",
    };
    info!(issue = %issue.id, tag = %tag.name, status, "Tag link");

    if json {
        return print_json(&TagActionResult {
            status,
            issue_id: issue.id.to_string(),
            tag,
        });
    }
    let verb = match status {
        "added" => "Added",
        "removed" => "Removed",
        "exists" => "Already tagged:",
        _ => "Not tagged:",
    };
    println!("{verb} {} on {} {}", tag.name, short_id(&issue.id), issue.title);
    Ok(())
}

fn tag_list(controller: &StoreController, json: bool) -> Result<()> {
    let counts = controller
        .all_tags()?
        .into_iter()
        .map(|tag| {
            let count = controller
                .try_current_issues(&Filter::for_tag(tag.clone()))?
                .len();
            Ok(TagCount { tag, count })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        return print_json(&counts);
    }
    if counts.is_empty() {
        println!("No tags.");
        return Ok(());
    }
    for entry in &counts {
        println!("{}", format_tag_line(&entry.tag, Some(entry.count)));
    }
    Ok(())
}

fn tag_missing(controller: &StoreController, issue_input: &str, json: bool) -> Result<()> {
    let issue = controller.resolve_issue(issue_input)?;
    let missing = controller.missing_tags(&issue.id)?;

    if json {
        return print_json(&missing);
    }
    if missing.is_empty() {
        println!("{} has every tag.", issue.title);
        return Ok(());
    }
    for tag in &missing {
        println!("{}", format_tag_line(tag, None));
    }
    Ok(())
}
