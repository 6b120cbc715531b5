//! Core data types for `ultimate_portfolio`.
//!
//! - `Issue` - A trackable unit of work
//! - `Tag` - A named label applicable to many issues
//! - `Priority` - Small-integer issue priority
//! - `Filter` - A named view selecting a subset of issues
//! - `EntityRef` - Reference to a deletable entity

use crate::util::time::{distant_past, to_storage_precision};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Title given to issues created without one.
pub const DEFAULT_ISSUE_TITLE: &str = "New issue";

/// Title length limit, enforced by the schema as well.
pub const MAX_TITLE_LEN: usize = 500;

/// Default width of the "recent issues" window.
pub const DEFAULT_RECENT_DAYS: i64 = 7;

/// Issue priority (0=low, 1=medium, 2=high).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Priority(pub i16);

impl Priority {
    pub const LOW: Self = Self(0);
    pub const MEDIUM: Self = Self(1);
    pub const HIGH: Self = Self(2);

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= Self::LOW.0 && self.0 <= Self::HIGH.0
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            0 => "low",
            1 => "medium",
            2 => "high",
            _ => "unknown",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Priority {
    type Err = crate::error::TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "low" => Ok(Self::LOW),
            "1" | "medium" => Ok(Self::MEDIUM),
            "2" | "high" => Ok(Self::HIGH),
            other => Err(crate::error::TrackerError::InvalidPriority {
                priority: other.to_string(),
            }),
        }
    }
}

/// A named label applicable to many issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

impl Tag {
    /// Create a tag with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// The primary issue entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    /// Unique ID.
    pub id: Uuid,

    /// Short title (1-500 chars).
    pub title: String,

    /// Free-form body.
    #[serde(default)]
    pub content: String,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    pub modified_at: DateTime<Utc>,

    /// Completion flag.
    #[serde(default)]
    pub completed: bool,

    /// Priority (0=low, 2=high).
    #[serde(default)]
    pub priority: Priority,

    /// Associated tags (loaded on demand).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Issue {
    /// Create a new issue stamped with the current time.
    ///
    /// A blank title is replaced with [`DEFAULT_ISSUE_TITLE`].
    #[must_use]
    pub fn new(title: &str) -> Self {
        Self::new_at(title, Utc::now())
    }

    /// Create a new issue stamped with `now`.
    #[must_use]
    pub fn new_at(title: &str, now: DateTime<Utc>) -> Self {
        let now = to_storage_precision(now);
        let title = title.trim();
        Self {
            id: Uuid::new_v4(),
            title: if title.is_empty() {
                DEFAULT_ISSUE_TITLE.to_string()
            } else {
                title.to_string()
            },
            content: String::new(),
            created_at: now,
            modified_at: now,
            completed: false,
            priority: Priority::default(),
            tags: Vec::new(),
        }
    }

    /// Display order: title, then creation time, then id.
    #[must_use]
    pub fn display_order(&self, other: &Self) -> std::cmp::Ordering {
        self.title
            .cmp(&other.title)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Tag names joined for display.
    #[must_use]
    pub fn tag_list(&self) -> String {
        if self.tags.is_empty() {
            return "No tags".to_string();
        }
        self.tags
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fields to update on an issue.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

impl IssueUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
    }
}

/// Kind of persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Issue,
    Tag,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = crate::error::TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(Self::Issue),
            "tag" => Ok(Self::Tag),
            other => Err(crate::error::TrackerError::corrupt(
                "change_log",
                format!("unknown entity kind '{other}'"),
            )),
        }
    }
}

/// Reference to a single deletable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Issue(Uuid),
    Tag(Uuid),
}

impl EntityRef {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Issue(id) | Self::Tag(id) => *id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Issue(_) => EntityKind::Issue,
            Self::Tag(_) => EntityKind::Tag,
        }
    }
}

impl From<&Issue> for EntityRef {
    fn from(issue: &Issue) -> Self {
        Self::Issue(issue.id)
    }
}

impl From<&Tag> for EntityRef {
    fn from(tag: &Tag) -> Self {
        Self::Tag(tag.id)
    }
}

/// Well-known id of the "all issues" filter.
pub const ALL_FILTER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0a11);

/// Well-known id of the "recent issues" filter.
pub const RECENT_FILTER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0ec7);

/// A named view over issues.
///
/// Equality and hashing use `id` only; display fields and the threshold do
/// not participate.
#[derive(Debug, Clone, Serialize)]
pub struct Filter {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
    pub min_modification_date: DateTime<Utc>,
    pub tag: Option<Tag>,
}

impl Filter {
    /// A filter with the default (distant past) threshold and no tag.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            icon: icon.into(),
            min_modification_date: distant_past(),
            tag: None,
        }
    }

    /// Every issue.
    #[must_use]
    pub fn all() -> Self {
        Self::new(ALL_FILTER_ID, "All Issues", "tray")
    }

    /// Issues modified within the last seven days.
    #[must_use]
    pub fn recent() -> Self {
        Self::recent_at(Utc::now(), DEFAULT_RECENT_DAYS)
    }

    /// Issues modified strictly after `now - days`.
    #[must_use]
    pub fn recent_at(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            min_modification_date: now - Duration::days(days),
            ..Self::new(RECENT_FILTER_ID, "Recent issues", "clock")
        }
    }

    /// Issues associated with `tag`.
    #[must_use]
    pub fn for_tag(tag: Tag) -> Self {
        Self {
            tag: Some(tag.clone()),
            ..Self::new(tag.id, tag.name, "tag")
        }
    }

    /// Override the modification threshold.
    #[must_use]
    pub fn modified_after(mut self, threshold: DateTime<Utc>) -> Self {
        self.min_modification_date = threshold;
        self
    }

    #[must_use]
    pub fn is_tag_filter(&self) -> bool {
        self.tag.is_some()
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::all()
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Filter {}

impl Hash for Filter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
