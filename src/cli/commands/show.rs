//! Show command implementation.

use super::open_store;
use crate::config;
use crate::error::Result;
use crate::format::{format_issue_details, print_json};

/// Execute the show command.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or an issue is not found.
pub fn execute(ids: &[String], json: bool, cli: &config::CliOverrides) -> Result<()> {
    let ctx = open_store(cli)?;

    let issues = ids
        .iter()
        .map(|id| ctx.controller.resolve_issue(id))
        .collect::<Result<Vec<_>>>()?;

    if json {
        return print_json(&issues);
    }

    for (i, issue) in issues.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", format_issue_details(issue));
    }
    Ok(())
}
