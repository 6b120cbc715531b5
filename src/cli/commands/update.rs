//! Update command implementation.

use super::{open_store, parse_priority};
use crate::cli::UpdateArgs;
use crate::config;
use crate::error::{Result, TrackerError};
use crate::format::{format_issue_line, print_json};
use crate::model::IssueUpdate;
use tracing::info;

fn build_update(args: &UpdateArgs) -> Result<IssueUpdate> {
    let completed = match (args.complete, args.reopen) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    };
    Ok(IssueUpdate {
        title: args.title.clone(),
        content: args.content.clone(),
        priority: parse_priority(args.priority.as_deref())?,
        completed,
    })
}

/// Execute the update command.
///
/// # Errors
///
/// Returns an error if nothing is to be updated, the issue is not found, or
/// a value is invalid.
pub fn execute(args: &UpdateArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let updates = build_update(args)?;
    if updates.is_empty() {
        return Err(TrackerError::validation(
            "update",
            "nothing to update (use --title, --content, --priority, --complete or --reopen)",
        ));
    }

    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    let issue = controller.resolve_issue(&args.id)?;
    let issue = controller.update_issue(&issue.id, &updates)?;
    controller.save()?;
    info!(id = %issue.id, actor = %ctx.actor, "Updated issue");

    if json {
        print_json(&issue)?;
    } else {
        println!("Updated {}", format_issue_line(&issue));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    #[test]
    fn build_update_maps_flags() {
        let args = UpdateArgs {
            id: "abcd".to_string(),
            priority: Some("high".to_string()),
            reopen: true,
            ..UpdateArgs::default()
        };
        let updates = build_update(&args).unwrap();
        assert_eq!(updates.priority, Some(Priority::HIGH));
        assert_eq!(updates.completed, Some(false));
        assert!(updates.title.is_none());
    }

    #[test]
    fn build_update_rejects_bad_priority() {
        let args = UpdateArgs {
            id: "abcd".to_string(),
            priority: Some("urgent".to_string()),
            ..UpdateArgs::default()
        };
        assert!(matches!(
            build_update(&args),
            Err(TrackerError::InvalidPriority { .. })
        ));
    }
}
