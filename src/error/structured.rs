//! Structured error output for scripted callers.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Database Errors (exit code 2) ===
    /// Store could not be loaded at startup
    StoreLoadFailed,
    /// Database operation failed
    DatabaseError,
    /// Stored record could not be decoded
    CorruptRecord,
    /// Workspace not initialized
    NotInitialized,
    /// Already initialized
    AlreadyInitialized,

    // === Entity Errors (exit code 3) ===
    /// Issue with specified ID not found
    IssueNotFound,
    /// Tag with specified ID or name not found
    TagNotFound,
    /// Tag name matches several tags
    AmbiguousTag,

    // === Validation Errors (exit code 4) ===
    /// Field validation failed
    ValidationFailed,
    /// Priority out of range
    InvalidPriority,
    /// Filter not recognized
    InvalidFilter,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StoreLoadFailed => "STORE_LOAD_FAILED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CorruptRecord => "CORRUPT_RECORD",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::TagNotFound => "TAG_NOT_FOUND",
            Self::AmbiguousTag => "AMBIGUOUS_TAG",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidPriority => "INVALID_PRIORITY",
            Self::InvalidFilter => "INVALID_FILTER",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is potentially retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError
                | Self::ValidationFailed
                | Self::InvalidPriority
                | Self::InvalidFilter
                | Self::AmbiguousTag
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Database errors
    /// - 3: Entity lookup errors
    /// - 4: Validation errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::StoreLoadFailed
            | Self::DatabaseError
            | Self::CorruptRecord
            | Self::NotInitialized
            | Self::AlreadyInitialized => 2,
            Self::IssueNotFound | Self::TagNotFound | Self::AmbiguousTag => 3,
            Self::ValidationFailed | Self::InvalidPriority | Self::InvalidFilter => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `TrackerError`.
    #[must_use]
    pub fn from_error(err: &TrackerError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = Self::generate_hint(err);

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Create a structured error with similar tag name suggestions.
    #[must_use]
    pub fn tag_not_found(searched: &str, existing_names: &[String]) -> Self {
        let similar = find_similar_names(searched, existing_names, 3);

        let hint = if similar.is_empty() {
            Some("Run 'upt tag list' to see available tags.".to_string())
        } else if similar.len() == 1 {
            Some(format!("Did you mean '{}'?", similar[0]))
        } else {
            Some(format!("Did you mean one of: {}?", similar.join(", ")))
        };

        Self {
            code: ErrorCode::TagNotFound,
            message: format!("Tag not found: {searched}"),
            hint,
            retryable: false,
            context: Some(json!({
                "searched": searched,
                "similar_names": similar,
            })),
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &TrackerError) -> (ErrorCode, Option<Value>) {
        match err {
            TrackerError::StoreLoad { path, .. } => (
                ErrorCode::StoreLoadFailed,
                Some(json!({"path": path.display().to_string()})),
            ),
            TrackerError::Database(_) => (ErrorCode::DatabaseError, None),
            TrackerError::CorruptRecord { table, reason } => (
                ErrorCode::CorruptRecord,
                Some(json!({"table": table, "reason": reason})),
            ),
            TrackerError::NotInitialized => (ErrorCode::NotInitialized, None),
            TrackerError::AlreadyInitialized { path } => (
                ErrorCode::AlreadyInitialized,
                Some(json!({"path": path.display().to_string()})),
            ),
            TrackerError::IssueNotFound { id } => {
                (ErrorCode::IssueNotFound, Some(json!({"searched_id": id})))
            }
            TrackerError::TagNotFound { id } => {
                (ErrorCode::TagNotFound, Some(json!({"searched": id})))
            }
            TrackerError::AmbiguousTag { name, matches } => (
                ErrorCode::AmbiguousTag,
                Some(json!({"name": name, "matches": matches})),
            ),
            TrackerError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            TrackerError::InvalidPriority { priority } => (
                ErrorCode::InvalidPriority,
                Some(json!({
                    "provided": priority,
                    "valid_values": ["low", "medium", "high", "0", "1", "2"],
                })),
            ),
            TrackerError::InvalidFilter { filter } => (
                ErrorCode::InvalidFilter,
                Some(json!({"provided": filter})),
            ),
            TrackerError::Config(_) => (ErrorCode::ConfigError, None),
            TrackerError::Io(_) => (ErrorCode::IoError, None),
            TrackerError::Json(_) => (ErrorCode::JsonError, None),
            TrackerError::Yaml(_) => (ErrorCode::YamlError, None),
            TrackerError::Other(_) => (ErrorCode::InternalError, None),
        }
    }

    fn generate_hint(err: &TrackerError) -> Option<String> {
        if let Some(suggestion) = err.suggestion() {
            if let TrackerError::InvalidPriority { priority } = err {
                if let Some(detected) = detect_priority_intent(priority) {
                    return Some(format!("Did you mean --priority {detected}?"));
                }
            }
            return Some(suggestion.to_string());
        }

        match err {
            TrackerError::IssueNotFound { .. } => {
                Some("Run 'upt list' to see available issues.".to_string())
            }
            TrackerError::TagNotFound { .. } => {
                Some("Run 'upt tag list' to see available tags.".to_string())
            }
            TrackerError::Database(_) => {
                Some("The database may be locked by another writer; retry shortly.".to_string())
            }
            _ => None,
        }
    }
}

/// Map common priority spellings to a canonical name.
fn detect_priority_intent(input: &str) -> Option<&'static str> {
    match input.trim().to_lowercase().as_str() {
        "l" | "lo" | "minor" | "p2" => Some("low"),
        "m" | "med" | "mid" | "normal" | "p1" => Some("medium"),
        "h" | "hi" | "urgent" | "critical" | "p0" => Some("high"),
        _ => None,
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find names close to `searched` (case-insensitive edit distance).
#[must_use]
pub fn find_similar_names(
    searched: &str,
    existing: &[String],
    max_suggestions: usize,
) -> Vec<String> {
    let needle = searched.to_lowercase();
    let threshold = (needle.chars().count() / 2).max(2);

    let mut scored: Vec<(usize, &String)> = existing
        .iter()
        .map(|name| (levenshtein_distance(&needle, &name.to_lowercase()), name))
        .filter(|(distance, _)| *distance <= threshold)
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.clone())
        .collect()
}
