//! Select command implementation.
//!
//! Shows or changes the selected filter and selected issue. The selection is
//! stored in the workspace so later `list` calls use it.

use super::open_store;
use crate::cli::SelectArgs;
use crate::config;
use crate::error::Result;
use crate::format::{format_filter_line, format_issue_line, print_json};
use crate::model::{Filter, Issue};
use serde::Serialize;

/// JSON output for select.
#[derive(Serialize)]
struct SelectionOutput<'a> {
    selected_filter: &'a Filter,
    selected_issue: Option<&'a Issue>,
    filters: &'a [Filter],
}

/// Execute the select command.
///
/// # Errors
///
/// Returns an error if the filter or issue cannot be resolved.
pub fn execute(args: &SelectArgs, json: bool, cli: &config::CliOverrides) -> Result<()> {
    let mut ctx = open_store(cli)?;
    let controller = &mut ctx.controller;
    controller.restore_selection()?;

    if let Some(spec) = &args.filter {
        let filter = controller.resolve_filter(spec)?;
        controller.set_selected_filter(filter);
    }
    if let Some(input) = &args.issue {
        let issue = controller.resolve_issue(input)?;
        controller.set_selected_issue(Some(issue));
    } else if args.clear_issue {
        controller.set_selected_issue(None);
    }
    controller.persist_selection()?;

    let mut filters = vec![Filter::all(), controller.recent_filter()];
    filters.extend(controller.all_tags()?.into_iter().map(Filter::for_tag));

    let selected = controller.selected_filter();
    if json {
        return print_json(&SelectionOutput {
            selected_filter: selected,
            selected_issue: controller.selected_issue(),
            filters: &filters,
        });
    }

    for filter in &filters {
        println!("{}", format_filter_line(filter, filter == selected));
    }
    println!();
    match controller.selected_issue() {
        Some(issue) => println!("Selected issue: {}", format_issue_line(issue)),
        None => println!("No issue selected"),
    }
    Ok(())
}
