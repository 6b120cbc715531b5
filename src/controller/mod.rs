//! The store controller: the single entry point consumers talk to.
//!
//! A `StoreController` owns one [`SqliteStorage`] editing context, tracks the
//! selected filter and selected issue, and publishes [`StoreChange`]
//! notifications so consumers know when to re-query.

mod feed;

pub use feed::{ChangeFeed, StoreChange};

use crate::error::{Result, TrackerError};
use crate::model::{
    ALL_FILTER_ID, DEFAULT_RECENT_DAYS, EntityKind, EntityRef, Filter, Issue, IssueUpdate,
    Priority, RECENT_FILTER_ID, Tag,
};
use crate::storage::SqliteStorage;
use crate::util::resolve_id_prefix;
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SELECTED_FILTER_KEY: &str = "selected_filter";
const SELECTED_ISSUE_KEY: &str = "selected_issue";

const SAMPLE_TAGS: usize = 5;
const SAMPLE_ISSUES_PER_TAG: usize = 10;

/// Ids removed by [`StoreController::delete_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteAllSummary {
    pub tags: Vec<Uuid>,
    pub issues: Vec<Uuid>,
}

impl DeleteAllSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.tags.len() + self.issues.len()
    }

    fn all_ids(&self) -> Vec<Uuid> {
        self.tags.iter().chain(&self.issues).copied().collect()
    }
}

/// Owns the editing context and the observable selection state.
#[derive(Debug)]
pub struct StoreController {
    storage: SqliteStorage,
    feed: ChangeFeed,
    selected_filter: Filter,
    selected_issue: Option<Issue>,
    last_seen_seq: i64,
    recent_days: i64,
}

impl StoreController {
    /// Wrap an opened store.
    ///
    /// Changes already in the log are treated as seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be read.
    pub fn new(storage: SqliteStorage) -> Result<Self> {
        let last_seen_seq = storage.latest_change_seq()?;
        Ok(Self {
            storage,
            feed: ChangeFeed::new(),
            selected_filter: Filter::all(),
            selected_issue: None,
            last_seen_seq,
            recent_days: DEFAULT_RECENT_DAYS,
        })
    }

    /// A controller over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::new(SqliteStorage::open_memory()?)
    }

    /// Set the width of the "recent issues" window.
    #[must_use]
    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }

    #[must_use]
    pub const fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Register for change notifications.
    pub fn subscribe(&mut self) -> Receiver<StoreChange> {
        self.feed.subscribe()
    }

    /// The "recent issues" filter using this controller's window.
    #[must_use]
    pub fn recent_filter(&self) -> Filter {
        Filter::recent_at(Utc::now(), self.recent_days)
    }

    // === Selection ===

    #[must_use]
    pub const fn selected_filter(&self) -> &Filter {
        &self.selected_filter
    }

    /// Change the selected filter. Returns `true` if it changed.
    pub fn set_selected_filter(&mut self, filter: Filter) -> bool {
        if self.selected_filter == filter {
            return false;
        }
        debug!(filter = %filter.name, "Selected filter");
        self.selected_filter = filter;
        self.feed.publish(&StoreChange::SelectionChanged);
        true
    }

    #[must_use]
    pub const fn selected_issue(&self) -> Option<&Issue> {
        self.selected_issue.as_ref()
    }

    /// Change the selected issue. Returns `true` if it changed.
    pub fn set_selected_issue(&mut self, issue: Option<Issue>) -> bool {
        let current = self.selected_issue.as_ref().map(|i| i.id);
        if current == issue.as_ref().map(|i| i.id) {
            return false;
        }
        self.selected_issue = issue;
        self.feed.publish(&StoreChange::SelectionChanged);
        true
    }

    /// Store the current selection in the metadata table.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written.
    pub fn persist_selection(&mut self) -> Result<()> {
        let filter_id = self.selected_filter.id.to_string();
        self.storage.set_metadata(SELECTED_FILTER_KEY, &filter_id)?;
        match self.selected_issue.as_ref().map(|i| i.id.to_string()) {
            Some(id) => self.storage.set_metadata(SELECTED_ISSUE_KEY, &id)?,
            None => {
                self.storage.delete_metadata(SELECTED_ISSUE_KEY)?;
            }
        }
        Ok(())
    }

    /// Restore a selection saved by [`persist_selection`](Self::persist_selection).
    ///
    /// Entities that no longer exist fall back to `Filter::all()` and no
    /// selected issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata or entities cannot be read.
    pub fn restore_selection(&mut self) -> Result<()> {
        let filter = match self
            .storage
            .get_metadata(SELECTED_FILTER_KEY)?
            .and_then(|s| Uuid::parse_str(&s).ok())
        {
            Some(id) if id == RECENT_FILTER_ID => self.recent_filter(),
            Some(id) if id == ALL_FILTER_ID => Filter::all(),
            Some(id) => self.storage.get_tag(&id)?.map_or_else(Filter::all, Filter::for_tag),
            None => Filter::all(),
        };
        let issue = match self
            .storage
            .get_metadata(SELECTED_ISSUE_KEY)?
            .and_then(|s| Uuid::parse_str(&s).ok())
        {
            Some(id) => self.storage.get_issue_with_tags(&id)?,
            None => None,
        };

        self.set_selected_filter(filter);
        self.set_selected_issue(issue);
        Ok(())
    }

    // === Queries ===

    /// Issues matching `filter`, in display order.
    ///
    /// A tag filter yields exactly that tag's issues; any other filter yields
    /// issues modified strictly after its threshold. Failures are logged and
    /// produce an empty list.
    #[must_use]
    pub fn current_issues(&self, filter: &Filter) -> Vec<Issue> {
        self.try_current_issues(filter).unwrap_or_else(|e| {
            warn!(filter = %filter.name, error = %e, "Issue query failed");
            Vec::new()
        })
    }

    /// Like [`current_issues`](Self::current_issues) but returns the error.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn try_current_issues(&self, filter: &Filter) -> Result<Vec<Issue>> {
        let mut issues = match &filter.tag {
            Some(tag) => self.storage.list_issues_for_tag(&tag.id)?,
            None => self
                .storage
                .list_issues_modified_after(&filter.min_modification_date)?,
        };

        let ids: Vec<Uuid> = issues.iter().map(|i| i.id).collect();
        let mut tags = self.storage.get_tags_for_issues(&ids)?;
        for issue in &mut issues {
            issue.tags = tags.remove(&issue.id).unwrap_or_default();
        }
        Ok(issues)
    }

    /// Look up an issue with its tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn issue(&self, id: &Uuid) -> Result<Option<Issue>> {
        self.storage.get_issue_with_tags(id)
    }

    /// Look up a tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tag(&self, id: &Uuid) -> Result<Option<Tag>> {
        self.storage.get_tag(id)
    }

    /// Every tag, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        self.storage.list_tags()
    }

    /// Tags associated with an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tags_for(&self, issue_id: &Uuid) -> Result<Vec<Tag>> {
        self.storage.get_tags_for_issue(issue_id)
    }

    /// Every tag not yet associated with the issue, ordered by name, then id.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if the issue does not exist.
    pub fn missing_tags(&self, issue_id: &Uuid) -> Result<Vec<Tag>> {
        if self.storage.get_issue(issue_id)?.is_none() {
            return Err(TrackerError::IssueNotFound {
                id: issue_id.to_string(),
            });
        }
        self.storage.get_missing_tags(issue_id)
    }

    /// Resolve a full id or unique id prefix to an issue.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` if nothing matches or a validation error if the
    /// prefix is ambiguous.
    pub fn resolve_issue(&self, input: &str) -> Result<Issue> {
        let known = self.storage.get_all_issue_ids()?;
        resolve_id_prefix(input, &known, "issue")?
            .map(|id| self.storage.get_issue_with_tags(&id))
            .transpose()?
            .flatten()
            .ok_or_else(|| TrackerError::IssueNotFound {
                id: input.to_string(),
            })
    }

    /// Resolve a tag by exact name, full id, or unique id prefix.
    ///
    /// # Errors
    ///
    /// Returns `TagNotFound` if nothing matches or `AmbiguousTag` if the name
    /// is shared by several tags.
    pub fn resolve_tag(&self, input: &str) -> Result<Tag> {
        let mut named = self.storage.find_tags_by_name(input.trim())?;
        match named.len() {
            1 => return Ok(named.remove(0)),
            0 => {}
            _ => {
                return Err(TrackerError::AmbiguousTag {
                    name: input.to_string(),
                    matches: named.iter().map(|t| t.id.to_string()).collect(),
                });
            }
        }

        let known: Vec<Uuid> = self.storage.list_tags()?.iter().map(|t| t.id).collect();
        let not_found = || TrackerError::TagNotFound {
            id: input.to_string(),
        };
        let Ok(Some(id)) = resolve_id_prefix(input, &known, "tag") else {
            return Err(not_found());
        };
        self.storage.get_tag(&id)?.ok_or_else(not_found)
    }

    /// Parse a filter description: `all`, `recent`, or `tag:<name-or-id>`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` for an unknown form, or a tag lookup error.
    pub fn resolve_filter(&self, spec: &str) -> Result<Filter> {
        let spec = spec.trim();
        match spec.to_lowercase().as_str() {
            "all" => return Ok(Filter::all()),
            "recent" => return Ok(self.recent_filter()),
            _ => {}
        }
        if let Some(tag) = spec.strip_prefix("tag:") {
            return Ok(Filter::for_tag(self.resolve_tag(tag)?));
        }
        Err(TrackerError::InvalidFilter {
            filter: spec.to_string(),
        })
    }

    // === Mutations ===

    /// Whether there are staged mutations not yet saved.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.storage.has_changes()
    }

    /// Commit staged mutations if there are any.
    ///
    /// Returns `Ok(false)` when nothing was pending. On failure the pending
    /// changes stay staged.
    ///
    /// # Errors
    ///
    /// Returns the commit error.
    pub fn save(&mut self) -> Result<bool> {
        match self.storage.save() {
            Ok(0) => Ok(false),
            Ok(changes) => {
                info!(changes, "Saved");
                self.feed.publish(&StoreChange::Saved { changes });
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "Save failed");
                Err(e)
            }
        }
    }

    /// Drop staged mutations. Returns how many changes were discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub fn discard_changes(&mut self) -> Result<usize> {
        let dropped = self.storage.discard()?;
        // Rolled-back log rows free their sequence numbers for reuse.
        self.last_seen_seq = self.last_seen_seq.min(self.storage.latest_change_seq()?);
        Ok(dropped)
    }

    /// Stage a new issue.
    ///
    /// # Errors
    ///
    /// Returns a validation or database error.
    pub fn create_issue(&mut self, title: &str) -> Result<Issue> {
        let issue = Issue::new(title);
        self.storage.create_issue(&issue)?;
        debug!(id = %issue.id, title = %issue.title, "Created issue");
        Ok(issue)
    }

    /// Stage a new tag.
    ///
    /// # Errors
    ///
    /// Returns a validation or database error.
    pub fn create_tag(&mut self, name: &str) -> Result<Tag> {
        let tag = Tag::new(name.trim());
        self.storage.create_tag(&tag)?;
        debug!(id = %tag.id, name = %tag.name, "Created tag");
        Ok(tag)
    }

    /// Stage field updates on an issue.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound` or a validation error.
    pub fn update_issue(&mut self, id: &Uuid, updates: &IssueUpdate) -> Result<Issue> {
        let mut issue = self.storage.update_issue(id, updates, Utc::now())?;
        issue.tags = self.storage.get_tags_for_issue(id)?;
        self.refresh_selected_issue(&issue);
        Ok(issue)
    }

    /// Stage a tag association. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`, `TagNotFound` or a database error.
    pub fn add_tag(&mut self, issue_id: &Uuid, tag_id: &Uuid) -> Result<bool> {
        self.storage.add_tag_to_issue(issue_id, tag_id, Utc::now())
    }

    /// Stage removal of a tag association. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn remove_tag(&mut self, issue_id: &Uuid, tag_id: &Uuid) -> Result<bool> {
        self.storage.remove_tag_from_issue(issue_id, tag_id, Utc::now())
    }

    /// Delete one entity and save.
    ///
    /// Publishes `WillChange` first. Deleting the selected issue clears the
    /// selection; deleting the tag behind the selected filter resets it to
    /// `Filter::all()`.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`/`TagNotFound`, or the delete or save error.
    pub fn delete(&mut self, entity: EntityRef) -> Result<()> {
        let id = entity.id();
        let found = match entity.kind() {
            EntityKind::Issue => self.storage.get_issue(&id)?.is_some(),
            EntityKind::Tag => self.storage.get_tag(&id)?.is_some(),
        };
        if !found {
            return Err(match entity {
                EntityRef::Issue(_) => TrackerError::IssueNotFound { id: id.to_string() },
                EntityRef::Tag(_) => TrackerError::TagNotFound { id: id.to_string() },
            });
        }

        self.feed.publish(&StoreChange::WillChange);
        match entity {
            EntityRef::Issue(_) => self.storage.delete_issue(&id)?,
            EntityRef::Tag(_) => self.storage.delete_tag(&id)?,
        };
        info!(entity = %entity.kind(), %id, "Deleted");

        self.clear_selection_of(&[id]);
        self.save()?;
        Ok(())
    }

    /// Delete every tag, then every issue, and save.
    ///
    /// Subscribers receive one `Deleted` notification carrying every removed
    /// id, and any selection that referenced a removed entity is cleared.
    ///
    /// # Errors
    ///
    /// Returns the delete or save error.
    pub fn delete_all(&mut self) -> Result<DeleteAllSummary> {
        let summary = DeleteAllSummary {
            tags: self.storage.batch_delete(EntityKind::Tag)?,
            issues: self.storage.batch_delete(EntityKind::Issue)?,
        };
        info!(
            tags = summary.tags.len(),
            issues = summary.issues.len(),
            "Deleted all"
        );

        let ids = summary.all_ids();
        self.feed.publish(&StoreChange::Deleted { ids: ids.clone() });
        self.clear_selection_of(&ids);
        self.save()?;
        Ok(summary)
    }

    /// Populate the store with demo data and save.
    ///
    /// Creates five tags, each with ten issues carrying a random completion
    /// flag and priority.
    ///
    /// # Errors
    ///
    /// Returns a database or save error.
    pub fn create_sample_data(&mut self) -> Result<()> {
        let mut rng = rand::rng();
        let now = Utc::now();

        for i in 1..=SAMPLE_TAGS {
            let tag = Tag::new(format!("Tag {i}"));
            self.storage.create_tag(&tag)?;

            for j in 1..=SAMPLE_ISSUES_PER_TAG {
                let mut issue = Issue::new_at(&format!("Issue {i}-{j}"), now);
                issue.content = "Description goes here".to_string();
                issue.completed = rng.random_bool(0.5);
                issue.priority = Priority(rng.random_range(Priority::LOW.0..=Priority::HIGH.0));
                self.storage.create_issue(&issue)?;
                self.storage.add_tag_to_issue(&issue.id, &tag.id, now)?;
            }
        }

        self.save()?;
        Ok(())
    }

    /// Check the change log for commits made by other sessions.
    ///
    /// Publishes a single `RemoteChange` when any are found and returns how
    /// many change rows were new.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be read.
    pub fn poll_remote_changes(&mut self) -> Result<usize> {
        let latest = self.storage.latest_change_seq()?;
        let mut foreign = self.storage.foreign_changes_since(self.last_seen_seq)?;
        foreign.retain(|change| change.seq <= latest);
        self.last_seen_seq = self.last_seen_seq.max(latest);

        if !foreign.is_empty() {
            debug!(changes = foreign.len(), "Remote changes detected");
            self.feed.publish(&StoreChange::RemoteChange);
        }
        Ok(foreign.len())
    }

    fn clear_selection_of(&mut self, ids: &[Uuid]) {
        if self
            .selected_issue
            .as_ref()
            .is_some_and(|issue| ids.contains(&issue.id))
        {
            self.set_selected_issue(None);
        }
        if self
            .selected_filter
            .tag
            .as_ref()
            .is_some_and(|tag| ids.contains(&tag.id))
        {
            self.set_selected_filter(Filter::all());
        }
    }

    fn refresh_selected_issue(&mut self, issue: &Issue) {
        if let Some(selected) = self.selected_issue.as_mut().filter(|s| s.id == issue.id) {
            selected.clone_from(issue);
        }
    }
}

impl Drop for StoreController {
    fn drop(&mut self) {
        if self.storage.has_changes() {
            warn!(
                changes = self.storage.pending_changes(),
                "Dropping store controller with unsaved changes"
            );
        }
    }
}
