//! `SQLite` storage implementation.
//!
//! The connection doubles as the editing context: the first mutation opens a
//! transaction that stays open until [`SqliteStorage::save`] or
//! [`SqliteStorage::discard`]. Each mutation runs inside its own savepoint so
//! a failed mutation leaves earlier pending work untouched.

use crate::error::{Result, TrackerError};
use crate::model::{EntityKind, Issue, IssueUpdate, MAX_TITLE_LEN, Priority, Tag};
use crate::storage::changes::{
    ChangeKind, ChangeRecord, PendingChange, get_changes_since, insert_change, latest_seq,
};
use crate::storage::schema::apply_schema;
use crate::util::time::{format_timestamp, parse_timestamp, to_storage_precision};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

const ISSUE_COLUMNS: &str = "id, title, content, created_at, modified_at, completed, priority";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    session_id: Uuid,
    pending_changes: usize,
}

/// Context for a mutation, collecting the change log rows it produces.
#[derive(Debug)]
pub struct MutationContext {
    pub op_name: String,
    pub changes: Vec<PendingChange>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn record(&mut self, entity: EntityKind, entity_id: Uuid, kind: ChangeKind) {
        self.changes.push(PendingChange {
            entity,
            entity_id,
            kind,
        });
    }
}

/// Raw issue columns, decoded outside the row callback.
struct IssueRow {
    id: String,
    title: String,
    content: String,
    created_at: String,
    modified_at: String,
    completed: bool,
    priority: i16,
}

impl IssueRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            modified_at: row.get(4)?,
            completed: row.get(5)?,
            priority: row.get(6)?,
        })
    }

    fn into_issue(self) -> Result<Issue> {
        Ok(Issue {
            id: parse_stored_id("issues", &self.id)?,
            title: self.title,
            content: self.content,
            created_at: parse_timestamp(&self.created_at)?,
            modified_at: parse_timestamp(&self.modified_at)?,
            completed: self.completed,
            priority: Priority(self.priority),
            tags: Vec::new(),
        })
    }
}

fn parse_stored_id(table: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| TrackerError::corrupt(table, format!("bad id '{value}': {e}")))
}

fn tag_from_strings(id: &str, name: String) -> Result<Tag> {
    Ok(Tag {
        id: parse_stored_id("tags", id)?,
        name,
    })
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TrackerError::validation("title", "cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(TrackerError::validation(
            "title",
            format!("exceeds {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_priority(priority: Priority) -> Result<()> {
    if priority.is_valid() {
        Ok(())
    } else {
        Err(TrackerError::InvalidPriority {
            priority: priority.0.to_string(),
        })
    }
}

fn validate_tag_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TrackerError::validation("name", "tag name cannot be empty"));
    }
    Ok(())
}

fn touch_issue(conn: &Connection, issue_id: &Uuid, now: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE issues SET modified_at = ? WHERE id = ?",
        params![format_timestamp(now), issue_id.to_string()],
    )?;
    Ok(())
}

fn exists(conn: &Connection, table: &str, id: &Uuid) -> Result<bool> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?");
    let found = conn
        .query_row(&sql, [id.to_string()], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

impl SqliteStorage {
    /// Open a connection to the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StoreLoad` if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a connection with an optional busy timeout (ms).
    ///
    /// # Errors
    ///
    /// Returns `StoreLoad` if the database cannot be opened or initialized.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let load_err = |source| TrackerError::StoreLoad {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(load_err)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))
                .map_err(load_err)?;
        }
        apply_schema(&conn).map_err(load_err)?;
        debug!(path = %path.display(), "Opened store");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            session_id: Uuid::new_v4(),
            pending_changes: 0,
        }
    }

    /// Identifier stamped on every change log row this connection writes.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Whether there are staged mutations not yet saved.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.pending_changes > 0
    }

    /// Number of change log rows staged since the last save or discard.
    #[must_use]
    pub const fn pending_changes(&self) -> usize {
        self.pending_changes
    }

    /// Commit staged mutations.
    ///
    /// Returns the number of changes committed (0 if nothing was pending).
    /// On failure the changes stay pending unless `SQLite` rolled the
    /// transaction back itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub fn save(&mut self) -> Result<usize> {
        if self.conn.is_autocommit() {
            self.pending_changes = 0;
            return Ok(0);
        }
        if self.pending_changes == 0 {
            // Open but empty: nothing to persist, just close it.
            self.conn.execute_batch("ROLLBACK")?;
            return Ok(0);
        }
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            if self.conn.is_autocommit() {
                self.pending_changes = 0;
            }
            return Err(e.into());
        }
        let committed = std::mem::take(&mut self.pending_changes);
        debug!(changes = committed, "Committed editing transaction");
        Ok(committed)
    }

    /// Roll back staged mutations. Returns how many changes were dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub fn discard(&mut self) -> Result<usize> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        let dropped = std::mem::take(&mut self.pending_changes);
        if dropped > 0 {
            debug!(changes = dropped, "Discarded editing transaction");
        }
        Ok(dropped)
    }

    /// Run a mutation inside the editing transaction.
    ///
    /// Opens the transaction if needed, runs `f` in a savepoint, appends the
    /// recorded change log rows and releases the savepoint. If `f` fails the
    /// savepoint is rolled back; earlier staged work is kept.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a database error from the bookkeeping.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Connection, &mut MutationContext) -> Result<R>,
    {
        let began = if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            trace!(op, "Opened editing transaction");
            true
        } else {
            false
        };

        let session_id = self.session_id;
        let outcome = Self::run_in_savepoint(&mut self.conn, &session_id, op, f);

        match outcome {
            Ok((result, recorded)) => {
                self.pending_changes += recorded;
                if began && recorded == 0 {
                    // Nothing changed: release the write lock again.
                    self.close_empty_transaction()?;
                }
                Ok(result)
            }
            Err(e) => {
                if began && self.pending_changes == 0 && !self.conn.is_autocommit() {
                    self.conn.execute_batch("ROLLBACK")?;
                }
                debug!(op, error = %e, "Mutation failed");
                Err(e)
            }
        }
    }

    /// Roll back an open transaction that holds no recorded change.
    fn close_empty_transaction(&mut self) -> Result<()> {
        if self.pending_changes == 0 && !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
            trace!("Closed empty editing transaction");
        }
        Ok(())
    }

    fn run_in_savepoint<F, R>(
        conn: &mut Connection,
        session_id: &Uuid,
        op: &str,
        f: F,
    ) -> Result<(R, usize)>
    where
        F: FnOnce(&Connection, &mut MutationContext) -> Result<R>,
    {
        let sp = conn.savepoint()?;
        let mut ctx = MutationContext::new(op);

        let result = f(&sp, &mut ctx)?;

        let now = format_timestamp(&Utc::now());
        for change in &ctx.changes {
            insert_change(&sp, session_id, change, &now)?;
        }
        sp.commit()?;

        trace!(op = %ctx.op_name, changes = ctx.changes.len(), "Staged mutation");
        Ok((result, ctx.changes.len()))
    }

    // === Issues ===

    /// Insert a new issue.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad title or priority, or a database
    /// error (e.g. id collision).
    pub fn create_issue(&mut self, issue: &Issue) -> Result<()> {
        validate_title(&issue.title)?;
        validate_priority(issue.priority)?;

        self.mutate("create_issue", |tx, ctx| {
            tx.execute(
                &format!("INSERT INTO issues ({ISSUE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"),
                params![
                    issue.id.to_string(),
                    issue.title,
                    issue.content,
                    format_timestamp(&issue.created_at),
                    format_timestamp(&issue.modified_at),
                    issue.completed,
                    issue.priority.0,
                ],
            )?;
            ctx.record(EntityKind::Issue, issue.id, ChangeKind::Inserted);
            Ok(())
        })
    }

    /// Apply field updates to an issue, bumping `modified_at` to `now`.
    ///
    /// An empty update leaves the issue untouched.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`, a validation error, or a database error.
    pub fn update_issue(
        &mut self,
        id: &Uuid,
        updates: &IssueUpdate,
        now: DateTime<Utc>,
    ) -> Result<Issue> {
        let mut issue = self
            .get_issue(id)?
            .ok_or_else(|| TrackerError::IssueNotFound { id: id.to_string() })?;
        if updates.is_empty() {
            return Ok(issue);
        }

        if let Some(title) = &updates.title {
            validate_title(title)?;
            issue.title = title.trim().to_string();
        }
        if let Some(content) = &updates.content {
            issue.content.clone_from(content);
        }
        if let Some(priority) = updates.priority {
            validate_priority(priority)?;
            issue.priority = priority;
        }
        if let Some(completed) = updates.completed {
            issue.completed = completed;
        }
        issue.modified_at = to_storage_precision(now);

        self.mutate("update_issue", |tx, ctx| {
            tx.execute(
                r"
                UPDATE issues
                SET title = ?, content = ?, completed = ?, priority = ?, modified_at = ?
                WHERE id = ?
                ",
                params![
                    issue.title,
                    issue.content,
                    issue.completed,
                    issue.priority.0,
                    format_timestamp(&issue.modified_at),
                    issue.id.to_string(),
                ],
            )?;
            ctx.record(EntityKind::Issue, issue.id, ChangeKind::Updated);
            Ok(())
        })?;

        Ok(issue)
    }

    /// Delete an issue. Its tag associations go with it; the tags stay.
    ///
    /// Returns `false` if the issue did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_issue(&mut self, id: &Uuid) -> Result<bool> {
        self.mutate("delete_issue", |tx, ctx| {
            let rows = tx.execute("DELETE FROM issues WHERE id = ?", [id.to_string()])?;
            if rows > 0 {
                ctx.record(EntityKind::Issue, *id, ChangeKind::Deleted);
            }
            Ok(rows > 0)
        })
    }

    /// Get an issue by id (without tags).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub fn get_issue(&self, id: &Uuid) -> Result<Option<Issue>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?"),
                [id.to_string()],
                IssueRow::from_row,
            )
            .optional()?;
        row.map(IssueRow::into_issue).transpose()
    }

    /// Get an issue by id with its tags loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_issue_with_tags(&self, id: &Uuid) -> Result<Option<Issue>> {
        let Some(mut issue) = self.get_issue(id)? else {
            return Ok(None);
        };
        issue.tags = self.get_tags_for_issue(id)?;
        Ok(Some(issue))
    }

    /// Issues with `modified_at` strictly after `threshold`, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues_modified_after(&self, threshold: &DateTime<Utc>) -> Result<Vec<Issue>> {
        self.query_issues(
            &format!(
                "SELECT {ISSUE_COLUMNS} FROM issues WHERE modified_at > ?
                 ORDER BY title, created_at, id"
            ),
            &format_timestamp(threshold),
        )
    }

    /// Issues associated with a tag, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues_for_tag(&self, tag_id: &Uuid) -> Result<Vec<Issue>> {
        self.query_issues(
            "SELECT i.id, i.title, i.content, i.created_at, i.modified_at, i.completed, i.priority
             FROM issues i
             JOIN issue_tags it ON it.issue_id = i.id
             WHERE it.tag_id = ?
             ORDER BY i.title, i.created_at, i.id",
            &tag_id.to_string(),
        )
    }

    fn query_issues(&self, sql: &str, param: &str) -> Result<Vec<Issue>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([param], IssueRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(IssueRow::into_issue).collect()
    }

    /// All issue ids, unordered.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_all_issue_ids(&self) -> Result<Vec<Uuid>> {
        self.query_ids("SELECT id FROM issues", "issues")
    }

    /// Count issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_issues(&self) -> Result<usize> {
        self.count("issues")
    }

    // === Tags ===

    /// Insert a new tag.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, or a database error.
    pub fn create_tag(&mut self, tag: &Tag) -> Result<()> {
        validate_tag_name(&tag.name)?;
        self.mutate("create_tag", |tx, ctx| {
            tx.execute(
                "INSERT INTO tags (id, name) VALUES (?, ?)",
                params![tag.id.to_string(), tag.name],
            )?;
            ctx.record(EntityKind::Tag, tag.id, ChangeKind::Inserted);
            Ok(())
        })
    }

    /// Delete a tag. Its issues are left in place.
    ///
    /// Returns `false` if the tag did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_tag(&mut self, id: &Uuid) -> Result<bool> {
        self.mutate("delete_tag", |tx, ctx| {
            let rows = tx.execute("DELETE FROM tags WHERE id = ?", [id.to_string()])?;
            if rows > 0 {
                ctx.record(EntityKind::Tag, *id, ChangeKind::Deleted);
            }
            Ok(rows > 0)
        })
    }

    /// Get a tag by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tag(&self, id: &Uuid) -> Result<Option<Tag>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, name FROM tags WHERE id = ?",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(id, name)| tag_from_strings(&id, name)).transpose()
    }

    /// All tags ordered by name, then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.query_tags("SELECT id, name FROM tags ORDER BY name, id", None)
    }

    /// Tags whose name matches exactly (case-sensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_tags_by_name(&self, name: &str) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT id, name FROM tags WHERE name = ? ORDER BY id",
            Some(name),
        )
    }

    /// Tags associated with an issue, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tags_for_issue(&self, issue_id: &Uuid) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT t.id, t.name FROM tags t
             JOIN issue_tags it ON it.tag_id = t.id
             WHERE it.issue_id = ?
             ORDER BY t.name, t.id",
            Some(&issue_id.to_string()),
        )
    }

    /// Tags not associated with an issue, ordered by name, then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_missing_tags(&self, issue_id: &Uuid) -> Result<Vec<Tag>> {
        self.query_tags(
            "SELECT id, name FROM tags
             WHERE id NOT IN (SELECT tag_id FROM issue_tags WHERE issue_id = ?)
             ORDER BY name, id",
            Some(&issue_id.to_string()),
        )
    }

    fn query_tags(&self, sql: &str, param: Option<&str>) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
            Ok((row.get(0)?, row.get(1)?))
        };
        let rows: Vec<(String, String)> = match param {
            Some(p) => stmt.query_map([p], map_row)?.collect::<std::result::Result<_, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<std::result::Result<_, _>>()?,
        };
        rows.into_iter()
            .map(|(id, name)| tag_from_strings(&id, name))
            .collect()
    }

    /// Tags for many issues at once, keyed by issue id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_tags_for_issues(&self, issue_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Tag>>> {
        const SQLITE_VAR_LIMIT: usize = 900;

        let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();

        for chunk in issue_ids.chunks(SQLITE_VAR_LIMIT) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT it.issue_id, t.id, t.name FROM issue_tags it
                 JOIN tags t ON t.id = it.tag_id
                 WHERE it.issue_id IN ({placeholders})
                 ORDER BY it.issue_id, t.name, t.id"
            );
            let ids: Vec<String> = chunk.iter().map(Uuid::to_string).collect();

            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for (issue_id, tag_id, name) in rows {
                map.entry(parse_stored_id("issue_tags", &issue_id)?)
                    .or_default()
                    .push(tag_from_strings(&tag_id, name)?);
            }
        }

        Ok(map)
    }

    /// Associate a tag with an issue, bumping the issue's `modified_at`.
    ///
    /// Returns `false` if they were already associated.
    ///
    /// # Errors
    ///
    /// Returns `IssueNotFound`/`TagNotFound` or a database error.
    pub fn add_tag_to_issue(
        &mut self,
        issue_id: &Uuid,
        tag_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.mutate("add_tag", |tx, ctx| {
            if !exists(tx, "issues", issue_id)? {
                return Err(TrackerError::IssueNotFound {
                    id: issue_id.to_string(),
                });
            }
            if !exists(tx, "tags", tag_id)? {
                return Err(TrackerError::TagNotFound {
                    id: tag_id.to_string(),
                });
            }

            let rows = tx.execute(
                "INSERT OR IGNORE INTO issue_tags (issue_id, tag_id) VALUES (?, ?)",
                params![issue_id.to_string(), tag_id.to_string()],
            )?;
            if rows == 0 {
                return Ok(false);
            }

            touch_issue(tx, issue_id, &now)?;
            ctx.record(EntityKind::Issue, *issue_id, ChangeKind::Linked);
            ctx.record(EntityKind::Tag, *tag_id, ChangeKind::Linked);
            Ok(true)
        })
    }

    /// Remove a tag from an issue, bumping the issue's `modified_at`.
    ///
    /// Returns `false` if they were not associated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn remove_tag_from_issue(
        &mut self,
        issue_id: &Uuid,
        tag_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.mutate("remove_tag", |tx, ctx| {
            let rows = tx.execute(
                "DELETE FROM issue_tags WHERE issue_id = ? AND tag_id = ?",
                params![issue_id.to_string(), tag_id.to_string()],
            )?;
            if rows == 0 {
                return Ok(false);
            }

            touch_issue(tx, issue_id, &now)?;
            ctx.record(EntityKind::Issue, *issue_id, ChangeKind::Unlinked);
            ctx.record(EntityKind::Tag, *tag_id, ChangeKind::Unlinked);
            Ok(true)
        })
    }

    /// Count tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_tags(&self) -> Result<usize> {
        self.count("tags")
    }

    // === Bulk ===

    /// Delete every row of one entity kind and return the deleted ids.
    ///
    /// Join rows cascade; rows of the other kind are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn batch_delete(&mut self, kind: EntityKind) -> Result<Vec<Uuid>> {
        let table = match kind {
            EntityKind::Issue => "issues",
            EntityKind::Tag => "tags",
        };

        self.mutate("batch_delete", |tx, ctx| {
            let mut stmt = tx.prepare(&format!("DELETE FROM {table} RETURNING id"))?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            drop(stmt);

            let ids = raw
                .iter()
                .map(|id| parse_stored_id(table, id))
                .collect::<Result<Vec<_>>>()?;
            for id in &ids {
                ctx.record(kind, *id, ChangeKind::Deleted);
            }
            debug!(entity = %kind, count = ids.len(), "Batch deleted");
            Ok(ids)
        })
    }

    // === Change log ===

    /// Change rows written by other sessions after `seq`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn foreign_changes_since(&self, seq: i64) -> Result<Vec<ChangeRecord>> {
        get_changes_since(&self.conn, seq, Some(&self.session_id), None)
    }

    /// Every change row after `seq`, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn changes_since(&self, seq: i64, limit: Option<usize>) -> Result<Vec<ChangeRecord>> {
        get_changes_since(&self.conn, seq, None, limit)
    }

    /// Highest change sequence number visible to this connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_change_seq(&self) -> Result<i64> {
        latest_seq(&self.conn)
    }

    // === Metadata ===

    /// Get a metadata value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Set a metadata value.
    ///
    /// Joins the editing transaction if it holds staged changes; an empty
    /// one is closed first so the write is not lost on `save()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.close_empty_transaction()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }

    /// Delete a metadata key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub fn delete_metadata(&mut self, key: &str) -> Result<bool> {
        self.close_empty_transaction()?;
        let count = self
            .conn
            .execute("DELETE FROM metadata WHERE key = ?", [key])?;
        Ok(count > 0)
    }

    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn query_ids(&self, sql: &str, table: &str) -> Result<Vec<Uuid>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raw.iter().map(|id| parse_stored_id(table, id)).collect()
    }
}

impl SqliteStorage {
    /// Execute raw SQL for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL execution fails.
    pub fn execute_test_sql(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn issue_at(title: &str, at: DateTime<Utc>) -> Issue {
        Issue::new_at(title, at)
    }

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(!storage.has_changes());
    }

    #[test]
    fn test_open_bad_path_is_store_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("nested").join("portfolio.db");
        let err = SqliteStorage::open(&path).unwrap_err();
        assert!(matches!(err, TrackerError::StoreLoad { .. }));
    }

    #[test]
    fn test_create_and_get_issue() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Write tests", t(1));
        storage.create_issue(&issue).unwrap();

        let loaded = storage.get_issue(&issue.id).unwrap().unwrap();
        assert_eq!(loaded, issue);
        assert!(storage.has_changes());
        assert_eq!(storage.count_issues().unwrap(), 1);
    }

    #[test]
    fn test_create_rejects_bad_title_and_priority() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut issue = issue_at("ok", t(1));
        issue.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(storage.create_issue(&issue).is_err());

        let mut issue = issue_at("ok", t(1));
        issue.priority = Priority(7);
        assert!(matches!(
            storage.create_issue(&issue),
            Err(TrackerError::InvalidPriority { .. })
        ));
        assert!(!storage.has_changes());
    }

    #[test]
    fn test_save_and_discard() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.save().unwrap(), 0);

        let kept = issue_at("Kept", t(1));
        storage.create_issue(&kept).unwrap();
        assert_eq!(storage.save().unwrap(), 1);
        assert!(!storage.has_changes());

        let dropped = issue_at("Dropped", t(2));
        storage.create_issue(&dropped).unwrap();
        assert_eq!(storage.discard().unwrap(), 1);

        assert!(storage.get_issue(&kept.id).unwrap().is_some());
        assert!(storage.get_issue(&dropped.id).unwrap().is_none());
    }

    #[test]
    fn test_failed_mutation_keeps_earlier_work() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("First", t(1));
        storage.create_issue(&issue).unwrap();

        // Same id again violates the primary key.
        assert!(storage.create_issue(&issue).is_err());
        assert!(storage.has_changes());
        assert_eq!(storage.save().unwrap(), 1);
        assert_eq!(storage.count_issues().unwrap(), 1);
    }

    #[test]
    fn test_failed_first_mutation_closes_transaction() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let missing = Uuid::new_v4();
        let err = storage.add_tag_to_issue(&missing, &Uuid::new_v4(), t(1));
        assert!(matches!(err, Err(TrackerError::IssueNotFound { .. })));
        assert!(!storage.has_changes());
        assert!(storage.conn.is_autocommit());
    }

    #[test]
    fn test_update_issue_bumps_modified_at() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Draft", t(1));
        storage.create_issue(&issue).unwrap();

        let updates = IssueUpdate {
            title: Some("Final".to_string()),
            completed: Some(true),
            ..IssueUpdate::default()
        };
        let updated = storage.update_issue(&issue.id, &updates, t(5)).unwrap();
        assert_eq!(updated.title, "Final");
        assert!(updated.completed);
        assert_eq!(updated.modified_at, t(5));
        assert_eq!(updated.created_at, t(1));

        let loaded = storage.get_issue(&issue.id).unwrap().unwrap();
        assert_eq!(loaded, updated);
    }

    #[test]
    fn test_update_missing_issue() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .update_issue(&Uuid::new_v4(), &IssueUpdate::default(), t(1))
            .unwrap_err();
        assert!(matches!(err, TrackerError::IssueNotFound { .. }));
    }

    #[test]
    fn test_modified_after_is_strict_and_sorted() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let b = issue_at("Beta", t(10));
        let a = issue_at("Alpha", t(12));
        let old = issue_at("Old", t(3));
        for issue in [&b, &a, &old] {
            storage.create_issue(issue).unwrap();
        }

        let titles: Vec<String> = storage
            .list_issues_modified_after(&t(3))
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);

        let all = storage
            .list_issues_modified_after(&(t(3) - Duration::seconds(1)))
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_tag_association_and_missing_tags() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Tagged", t(1));
        let work = Tag::new("Work");
        let home = Tag::new("Home");
        storage.create_issue(&issue).unwrap();
        storage.create_tag(&work).unwrap();
        storage.create_tag(&home).unwrap();

        assert!(storage.add_tag_to_issue(&issue.id, &work.id, t(4)).unwrap());
        assert!(!storage.add_tag_to_issue(&issue.id, &work.id, t(5)).unwrap());

        assert_eq!(storage.get_tags_for_issue(&issue.id).unwrap(), vec![work.clone()]);
        assert_eq!(storage.get_missing_tags(&issue.id).unwrap(), vec![home]);
        assert_eq!(storage.list_issues_for_tag(&work.id).unwrap().len(), 1);

        let loaded = storage.get_issue(&issue.id).unwrap().unwrap();
        assert_eq!(loaded.modified_at, t(4));

        assert!(storage.remove_tag_from_issue(&issue.id, &work.id, t(6)).unwrap());
        assert!(!storage.remove_tag_from_issue(&issue.id, &work.id, t(7)).unwrap());
        assert!(storage.get_tags_for_issue(&issue.id).unwrap().is_empty());
        let loaded = storage.get_issue(&issue.id).unwrap().unwrap();
        assert_eq!(loaded.modified_at, t(6));
    }

    #[test]
    fn test_delete_tag_keeps_issues() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Survivor", t(1));
        let tag = Tag::new("Doomed");
        storage.create_issue(&issue).unwrap();
        storage.create_tag(&tag).unwrap();
        storage.add_tag_to_issue(&issue.id, &tag.id, t(2)).unwrap();

        assert!(storage.delete_tag(&tag.id).unwrap());
        assert!(storage.get_issue(&issue.id).unwrap().is_some());
        assert!(storage.get_tags_for_issue(&issue.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_issue_keeps_tags() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Doomed", t(1));
        let tag = Tag::new("Survivor");
        storage.create_issue(&issue).unwrap();
        storage.create_tag(&tag).unwrap();
        storage.add_tag_to_issue(&issue.id, &tag.id, t(2)).unwrap();

        assert!(storage.delete_issue(&issue.id).unwrap());
        assert!(!storage.delete_issue(&issue.id).unwrap());
        assert!(storage.get_tag(&tag.id).unwrap().is_some());
        assert!(storage.list_issues_for_tag(&tag.id).unwrap().is_empty());
    }

    #[test]
    fn test_batch_delete_returns_ids() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = issue_at("A", t(1));
        let b = issue_at("B", t(1));
        let tag = Tag::new("T");
        storage.create_issue(&a).unwrap();
        storage.create_issue(&b).unwrap();
        storage.create_tag(&tag).unwrap();
        storage.add_tag_to_issue(&a.id, &tag.id, t(2)).unwrap();

        let tag_ids = storage.batch_delete(EntityKind::Tag).unwrap();
        assert_eq!(tag_ids, vec![tag.id]);
        assert_eq!(storage.count_issues().unwrap(), 2);

        let mut issue_ids = storage.batch_delete(EntityKind::Issue).unwrap();
        issue_ids.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(issue_ids, expected);
        assert_eq!(storage.count_issues().unwrap(), 0);
        assert_eq!(storage.count_tags().unwrap(), 0);
    }

    #[test]
    fn test_get_tags_for_issues() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = issue_at("A", t(1));
        let b = issue_at("B", t(1));
        let tag = Tag::new("Shared");
        storage.create_issue(&a).unwrap();
        storage.create_issue(&b).unwrap();
        storage.create_tag(&tag).unwrap();
        storage.add_tag_to_issue(&a.id, &tag.id, t(2)).unwrap();

        let map = storage.get_tags_for_issues(&[a.id, b.id]).unwrap();
        assert_eq!(map.get(&a.id), Some(&vec![tag]));
        assert!(!map.contains_key(&b.id));
        assert!(storage.get_tags_for_issues(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_mutations_write_change_log() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let issue = issue_at("Logged", t(1));
        let tag = Tag::new("Logged");
        storage.create_issue(&issue).unwrap();
        storage.create_tag(&tag).unwrap();
        storage.add_tag_to_issue(&issue.id, &tag.id, t(2)).unwrap();
        assert_eq!(storage.pending_changes(), 4);

        let rows = storage.changes_since(0, None).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.session_id == storage.session_id()));
        assert!(storage.foreign_changes_since(0).unwrap().is_empty());
    }

    #[test]
    fn test_pending_writes_invisible_to_other_connection() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("portfolio.db");
        let mut writer = SqliteStorage::open_with_timeout(&path, Some(1000)).unwrap();
        let reader = SqliteStorage::open(&path).unwrap();

        let issue = issue_at("Pending", t(1));
        writer.create_issue(&issue).unwrap();
        assert_eq!(reader.count_issues().unwrap(), 0);

        writer.save().unwrap();
        assert_eq!(reader.count_issues().unwrap(), 1);
        assert_eq!(reader.foreign_changes_since(0).unwrap().len(), 1);
    }

    #[test]
    fn test_metadata() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.get_metadata("k").unwrap(), None);
        storage.set_metadata("k", "v").unwrap();
        assert_eq!(storage.get_metadata("k").unwrap().as_deref(), Some("v"));
        assert!(storage.delete_metadata("k").unwrap());
        assert!(!storage.delete_metadata("k").unwrap());
    }

    #[test]
    fn test_find_tags_by_name() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = Tag::new("dup");
        let b = Tag::new("dup");
        storage.create_tag(&a).unwrap();
        storage.create_tag(&b).unwrap();
        assert_eq!(storage.find_tags_by_name("dup").unwrap().len(), 2);
        assert!(storage.find_tags_by_name("DUP").unwrap().is_empty());
    }
}
