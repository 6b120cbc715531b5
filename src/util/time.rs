//! Time and date utilities.
//!
//! Timestamps are persisted as fixed-width RFC3339 strings
//! (`YYYY-MM-DDTHH:MM:SS.ffffffZ`) so that lexical comparison in SQL matches
//! chronological order.

use crate::error::{Result, TrackerError};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

/// Earliest representable modification date (0001-01-01T00:00:00Z).
///
/// Used as the threshold of filters that should match every issue.
#[must_use]
pub fn distant_past() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Format a timestamp for storage.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
///
/// # Errors
///
/// Returns an error if the value is not valid RFC3339.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrackerError::corrupt("timestamp", format!("'{s}': {e}")))
}

/// Truncate to the precision used on disk so in-memory values compare equal
/// to values read back from the store.
#[must_use]
pub fn to_storage_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    parse_timestamp(&format_timestamp(&dt)).unwrap_or(dt)
}

/// Parse a flexible time expression into a `DateTime<Utc>`.
///
/// Supports:
/// - RFC3339: `2025-01-15T12:00:00Z`
/// - Simple date: `2025-01-15` (midnight local time)
/// - Relative duration: `-7d`, `-2h`, `+1w`, `-30m`
/// - Keywords: `now`, `today`, `yesterday`
///
/// # Errors
///
/// Returns an error if the format is not recognized.
pub fn parse_flexible_timestamp(s: &str, field_name: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_midnight(date, field_name);
    }

    if let Some(dt) = parse_relative_time(s) {
        return Ok(dt);
    }

    let today = Local::now().date_naive();
    match s.to_lowercase().as_str() {
        "now" => Ok(Utc::now()),
        "today" => local_midnight(today, field_name),
        "yesterday" => local_midnight(today - Duration::days(1), field_name),
        _ => Err(TrackerError::validation(
            field_name,
            "invalid time format (try: -7d, -2h, yesterday, or 2025-01-15)",
        )),
    }
}

/// Parse a relative duration such as `-7d` or `+1h` against the current time.
///
/// Returns `None` if the input is not a relative duration.
#[must_use]
pub fn parse_relative_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let rest = s.strip_prefix(['+', '-'].as_ref())?;
    let is_negative = s.starts_with('-');
    let unit_char = rest.chars().last()?;
    let amount: i64 = rest[..rest.len() - unit_char.len_utf8()].parse().ok()?;
    let amount = if is_negative { -amount } else { amount };

    let duration = match unit_char {
        'm' => Duration::minutes(amount),
        'h' => Duration::hours(amount),
        'd' => Duration::days(amount),
        'w' => Duration::weeks(amount),
        _ => return None,
    };
    Some(Utc::now() + duration)
}

fn local_midnight(date: NaiveDate, field_name: &str) -> Result<DateTime<Utc>> {
    let naive_dt = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive_dt)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TrackerError::validation(field_name, "ambiguous local time"))
}
