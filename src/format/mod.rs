//! Output formatting for `ultimate_portfolio`.
//!
//! Human-readable text goes through [`text`]; `--json` output is pretty JSON
//! on stdout via [`print_json`].

mod text;

pub use text::{
    format_filter_line, format_issue_details, format_issue_line, format_issue_line_with,
    format_tag_line, icons, terminal_width, truncate_title, TextFormatOptions,
};

use crate::error::Result;
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
