//! Error types and handling for `ultimate_portfolio`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Wraps `anyhow` errors from the logging/bootstrap edge
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output for scripted callers

mod structured;

pub use structured::{ErrorCode, StructuredError};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for store and controller operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    // === Storage Errors ===
    /// The store could not be opened at startup.
    #[error("Failed to load store at '{path}': {source}")]
    StoreLoad {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored value could not be decoded.
    #[error("Corrupt record in {table}: {reason}")]
    CorruptRecord { table: String, reason: String },

    // === Entity Errors ===
    /// Issue with the specified ID was not found.
    #[error("Issue not found: {id}")]
    IssueNotFound { id: String },

    /// Tag with the specified ID or name was not found.
    #[error("Tag not found: {id}")]
    TagNotFound { id: String },

    /// A tag name matches more than one tag.
    #[error("Ambiguous tag '{name}': matches {matches:?}")]
    AmbiguousTag { name: String, matches: Vec<String> },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Priority out of valid range (0-2).
    #[error("Priority must be 0-2 (low, medium, high), got: {priority}")]
    InvalidPriority { priority: String },

    /// Filter description not recognized.
    #[error("Invalid filter: {filter}")]
    InvalidFilter { filter: String },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workspace not initialized.
    #[error("Workspace not initialized: run 'upt init' first")]
    NotInitialized,

    /// Already initialized.
    #[error("Already initialized at '{path}'")]
    AlreadyInitialized { path: PathBuf },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::IssueNotFound { .. }
                | Self::TagNotFound { .. }
                | Self::AmbiguousTag { .. }
                | Self::Validation { .. }
                | Self::InvalidPriority { .. }
                | Self::InvalidFilter { .. }
                | Self::AlreadyInitialized { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run: upt init"),
            Self::StoreLoad { .. } => Some("Check the --db path or run: upt init"),
            Self::AmbiguousTag { .. } => Some("Refer to the tag by its id instead"),
            Self::AlreadyInitialized { .. } => Some("Use --force to reinitialize"),
            Self::InvalidPriority { .. } => Some("Use low, medium, high (or 0, 1, 2)"),
            Self::InvalidFilter { .. } => Some("Valid filters: all, recent, tag:<name>"),
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt-record error.
    #[must_use]
    pub fn corrupt(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            table: table.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using `TrackerError`.
pub type Result<T> = std::result::Result<T, TrackerError>;
