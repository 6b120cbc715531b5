//! List command implementation.

use super::open_store;
use crate::cli::ListArgs;
use crate::config;
use crate::error::Result;
use crate::format::{TextFormatOptions, format_issue_line_with, icons, print_json};
use crate::model::{Filter, Issue};
use crate::util::time::parse_flexible_timestamp;
use serde::Serialize;

/// JSON output for list.
#[derive(Serialize)]
struct ListOutput<'a> {
    filter: &'a Filter,
    count: usize,
    issues: &'a [Issue],
}

/// Execute the list command.
///
/// Without `--filter` the persisted selected filter is used.
///
/// # Errors
///
/// Returns an error if the filter is invalid or the query fails.
pub fn execute(args: &ListArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    controller.restore_selection()?;

    let mut filter = match &args.filter {
        Some(spec) => controller.resolve_filter(spec)?,
        None => controller.selected_filter().clone(),
    };
    let since = args
        .since
        .as_deref()
        .map(|s| parse_flexible_timestamp(s, "since"))
        .transpose()?;
    if let Some(since) = since.filter(|_| !filter.is_tag_filter()) {
        let threshold = since.max(filter.min_modification_date);
        filter = filter.modified_after(threshold);
    }

    let mut issues = controller.try_current_issues(&filter)?;
    // Tag filters ignore their threshold, so narrow those here.
    if let Some(since) = since.filter(|_| filter.is_tag_filter()) {
        issues.retain(|issue| issue.modified_at > since);
    }
    if args.completed {
        issues.retain(|issue| issue.completed);
    } else if args.open {
        issues.retain(|issue| !issue.completed);
    }
    if let Some(limit) = args.limit {
        issues.truncate(limit);
    }

    if json {
        return print_json(&ListOutput {
            filter: &filter,
            count: issues.len(),
            issues: &issues,
        });
    }

    println!("{} ({})", filter.name, issues.len());
    if issues.is_empty() {
        println!("No issues found.");
        return Ok(());
    }

    let selected = controller.selected_issue().map(|issue| issue.id);
    let options = TextFormatOptions::terminal();
    let row_options = TextFormatOptions {
        max_width: options.max_width.map(|w| w.saturating_sub(2)),
    };
    for issue in &issues {
        let marker = if selected == Some(issue.id) {
            icons::SELECTED
        } else {
            " "
        };
        println!("{marker} {}", format_issue_line_with(issue, row_options));
    }
    Ok(())
}
