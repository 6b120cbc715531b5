//! Text formatting functions.
//!
//! Plain (non-ANSI) output for terminals:
//! - Completion icons (○ ✓)
//! - Priority badges ([low], [medium], [high])
//! - Issue, tag and filter lines

use crate::model::{Filter, Issue, Tag};
use crate::util::short_id;
use crate::util::time::format_timestamp;
use std::fmt::Write as _;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Icon characters.
pub mod icons {
    /// Open issue.
    pub const OPEN: &str = "○";
    /// Completed issue.
    pub const COMPLETED: &str = "✓";
    /// Marks the selected row.
    pub const SELECTED: &str = "▸";
}

/// Formatting options for text output.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatOptions {
    pub max_width: Option<usize>,
}

impl TextFormatOptions {
    #[must_use]
    pub const fn plain() -> Self {
        Self { max_width: None }
    }

    #[must_use]
    pub fn terminal() -> Self {
        Self {
            max_width: Some(terminal_width()),
        }
    }
}

/// Determine terminal width from environment (falls back to 80).
#[must_use]
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|columns| columns.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(80)
}

/// Truncate a title to fit within `max_len` visible columns.
///
/// Handles wide characters (emojis, CJK) correctly using `unicode-width`.
#[must_use]
pub fn truncate_title(title: &str, max_len: usize) -> String {
    if UnicodeWidthStr::width(title) <= max_len {
        return title.to_string();
    }
    if max_len <= 3 {
        return take_columns(title, max_len);
    }

    let mut s = take_columns(title, max_len - 3);
    s.push_str("...");
    s
}

fn take_columns(text: &str, columns: usize) -> String {
    let mut w = 0;
    let mut s = String::new();
    for c in text.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if w + cw > columns {
            break;
        }
        w += cw;
        s.push(c);
    }
    s
}

const fn completion_icon(issue: &Issue) -> &'static str {
    if issue.completed {
        icons::COMPLETED
    } else {
        icons::OPEN
    }
}

/// Format a single-line issue summary with options.
///
/// Format: `{icon} {short-id} [{priority}] {title}`
#[must_use]
pub fn format_issue_line_with(issue: &Issue, options: TextFormatOptions) -> String {
    let icon = completion_icon(issue);
    let id = short_id(&issue.id);
    let badge = format!("[{}]", issue.priority.label());

    let prefix_len = UnicodeWidthStr::width(icon) + 1 + id.len() + 1 + badge.len() + 1;
    let title = options.max_width.map_or_else(
        || issue.title.clone(),
        |width| truncate_title(&issue.title, width.saturating_sub(prefix_len)),
    );

    format!("{icon} {id} {badge} {title}")
}

/// Format a single-line issue summary.
#[must_use]
pub fn format_issue_line(issue: &Issue) -> String {
    format_issue_line_with(issue, TextFormatOptions::plain())
}

/// Multi-line detail view of one issue.
#[must_use]
pub fn format_issue_details(issue: &Issue) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", completion_icon(issue), issue.title);
    let _ = writeln!(out, "ID:        {}", issue.id);
    let _ = writeln!(out, "Priority:  {}", issue.priority);
    let _ = writeln!(
        out,
        "Status:    {}",
        if issue.completed { "completed" } else { "open" }
    );
    let _ = writeln!(out, "Tags:      {}", issue.tag_list());
    let _ = writeln!(out, "Created:   {}", format_timestamp(&issue.created_at));
    let _ = writeln!(out, "Modified:  {}", format_timestamp(&issue.modified_at));
    if !issue.content.is_empty() {
        let _ = writeln!(out);
        for line in issue.content.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    out
}

/// Format a tag as `{short-id} {name}`, with an optional issue count.
#[must_use]
pub fn format_tag_line(tag: &Tag, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({n})", short_id(&tag.id), tag.name),
        None => format!("{} {}", short_id(&tag.id), tag.name),
    }
}

/// Format a filter row, marking the selected one.
#[must_use]
pub fn format_filter_line(filter: &Filter, selected: bool) -> String {
    let marker = if selected { icons::SELECTED } else { " " };
    format!("{marker} [{}] {}", filter.icon, filter.name)
}
