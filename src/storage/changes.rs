//! Change log storage.
//!
//! Every mutation appends one row per touched entity in the same transaction
//! as the mutation itself, so the log only ever contains committed work.
//! Other sessions poll the log by sequence number to learn about writes they
//! did not make.

use crate::error::{Result, TrackerError};
use crate::model::EntityKind;
use crate::util::time::parse_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    Linked,
    Unlinked,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Linked => "linked",
            Self::Unlinked => "unlinked",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inserted" => Ok(Self::Inserted),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            "linked" => Ok(Self::Linked),
            "unlinked" => Ok(Self::Unlinked),
            other => Err(TrackerError::corrupt(
                "change_log",
                format!("unknown change kind '{other}'"),
            )),
        }
    }
}

/// A change staged by a mutation, written when the mutation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChange {
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub kind: ChangeKind,
}

/// A committed change log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    pub seq: i64,
    pub session_id: Uuid,
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub kind: ChangeKind,
    pub created_at: DateTime<Utc>,
}

/// Append a change row. Must run inside the mutation's transaction.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_change(
    conn: &Connection,
    session_id: &Uuid,
    change: &PendingChange,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO change_log (session_id, entity, entity_id, kind, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
        params![
            session_id.to_string(),
            change.entity.as_str(),
            change.entity_id.to_string(),
            change.kind.as_str(),
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Read change rows with `seq > after`, oldest first.
///
/// When `exclude_session` is set, rows written by that session are skipped.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn get_changes_since(
    conn: &Connection,
    after: i64,
    exclude_session: Option<&Uuid>,
    limit: Option<usize>,
) -> Result<Vec<ChangeRecord>> {
    let excluded = exclude_session.map(Uuid::to_string);
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let mut stmt = conn.prepare(
        r"
        SELECT seq, session_id, entity, entity_id, kind, created_at
        FROM change_log
        WHERE seq > ?1 AND (?2 IS NULL OR session_id != ?2)
        ORDER BY seq ASC
        LIMIT ?3
        ",
    )?;

    let rows = stmt
        .query_map(params![after, excluded, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(seq, session, entity, entity_id, kind, created_at)| {
            Ok(ChangeRecord {
                seq,
                session_id: parse_log_uuid(&session)?,
                entity: entity.parse()?,
                entity_id: parse_log_uuid(&entity_id)?,
                kind: kind.parse()?,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}

/// Highest sequence number in the log (0 when empty).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_seq(conn: &Connection) -> Result<i64> {
    let seq: Option<i64> = conn.query_row("SELECT MAX(seq) FROM change_log", [], |row| {
        row.get(0)
    })?;
    Ok(seq.unwrap_or(0))
}

fn parse_log_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| TrackerError::corrupt("change_log", format!("bad id '{value}': {e}")))
}
