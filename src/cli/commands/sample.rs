//! Sample command implementation.

use super::open_store;
use crate::config;
use crate::error::Result;
use crate::format::print_json;
use crate::model::Filter;
use serde_json::json;
use tracing::info;

/// Execute the sample command.
///
/// # Errors
///
/// Returns an error if the sample data cannot be created or saved.
pub fn execute(json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;

    controller.create_sample_data()?;
    let tags = controller.all_tags()?.len();
    let issues = controller.try_current_issues(&Filter::all())?.len();
    info!(tags, issues, actor = %ctx.actor, "Created sample data");

    if json {
        return print_json(&json!({ "tags": tags, "issues": issues }));
    }
    println!("Sample data created: {tags} tag(s), {issues} issue(s)");
    Ok(())
}
