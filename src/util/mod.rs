//! Shared utilities for `ultimate_portfolio`.
//!
//! - Time parsing and formatting (fixed-width RFC3339)
//! - Entity ID parsing (UUID, with unique-prefix lookup)

pub mod time;

use crate::error::{Result, TrackerError};
use uuid::Uuid;

/// Parse a full UUID string.
///
/// # Errors
///
/// Returns a validation error naming `field` if the input is not a UUID.
pub fn parse_uuid(input: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim())
        .map_err(|_| TrackerError::validation(field, format!("'{input}' is not a valid id")))
}

/// Resolve a possibly-abbreviated ID against the known IDs.
///
/// Accepts a full UUID or a unique prefix of its hyphenated form (at least
/// 4 characters). Returns `None` when nothing matches.
///
/// # Errors
///
/// Returns a validation error if the prefix is too short or ambiguous.
pub fn resolve_id_prefix(input: &str, known: &[Uuid], field: &str) -> Result<Option<Uuid>> {
    let needle = input.trim().to_lowercase();
    if let Ok(id) = Uuid::parse_str(&needle) {
        return Ok(known.contains(&id).then_some(id));
    }
    if needle.len() < 4 {
        return Err(TrackerError::validation(
            field,
            "id prefix must be at least 4 characters",
        ));
    }

    let matches: Vec<Uuid> = known
        .iter()
        .filter(|id| id.hyphenated().to_string().starts_with(&needle))
        .copied()
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(TrackerError::validation(
            field,
            format!("'{input}' matches {} ids; use more characters", matches.len()),
        )),
    }
}

/// Short display form of an ID (first 8 hex digits).
#[must_use]
pub fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid", "issue").is_err());
    }

    #[test]
    fn test_resolve_id_prefix_unique_match() {
        let a = Uuid::parse_str("aaaa1111-0000-4000-8000-000000000000").unwrap();
        let b = Uuid::parse_str("bbbb2222-0000-4000-8000-000000000000").unwrap();
        let known = vec![a, b];

        assert_eq!(resolve_id_prefix("aaaa", &known, "issue").unwrap(), Some(a));
        assert_eq!(resolve_id_prefix(&b.to_string(), &known, "issue").unwrap(), Some(b));
        assert_eq!(resolve_id_prefix("cccc", &known, "issue").unwrap(), None);
    }

    #[test]
    fn test_resolve_id_prefix_ambiguous_and_short() {
        let a = Uuid::parse_str("abcd1111-0000-4000-8000-000000000000").unwrap();
        let b = Uuid::parse_str("abcd2222-0000-4000-8000-000000000000").unwrap();
        let known = vec![a, b];

        assert!(resolve_id_prefix("abcd", &known, "issue").is_err());
        assert!(resolve_id_prefix("ab", &known, "issue").is_err());
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("abcd1111-0000-4000-8000-000000000000").unwrap();
        assert_eq!(short_id(&id), "abcd1111");
    }
}
