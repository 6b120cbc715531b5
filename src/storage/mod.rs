//! Persistence layer.
//!
//! - `schema` - table definitions and migrations
//! - `sqlite` - the `SqliteStorage` editing context
//! - `changes` - the append-only change log

pub mod changes;
pub mod schema;
pub mod sqlite;

pub use changes::{ChangeKind, ChangeRecord};
pub use sqlite::{MutationContext, SqliteStorage};
