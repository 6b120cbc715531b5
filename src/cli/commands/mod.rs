//! Command implementations, one module per subcommand.

pub mod changes;
pub mod create;
pub mod delete;
pub mod delete_all;
pub mod init;
pub mod list;
pub mod sample;
pub mod select;
pub mod show;
pub mod tag;
pub mod update;

use crate::config::{self, CliOverrides, StoreContext};
use crate::error::{Result, TrackerError};
use crate::model::Priority;
use std::path::PathBuf;

/// Locate the workspace and open its store.
///
/// When no workspace is found but `--db` names a file, that file's directory
/// is used as the workspace.
pub(crate) fn open_store(cli: &CliOverrides) -> Result<StoreContext> {
    let workspace = match config::discover_workspace(None) {
        Ok(dir) => dir,
        Err(TrackerError::NotInitialized) => db_parent(cli).ok_or(TrackerError::NotInitialized)?,
        Err(e) => return Err(e),
    };
    config::open_controller(&workspace, cli)
}

fn db_parent(cli: &CliOverrides) -> Option<PathBuf> {
    cli.db
        .as_ref()
        .filter(|db| db.exists())
        .and_then(|db| db.parent())
        .map(PathBuf::from)
}

pub(crate) fn parse_priority(input: Option<&str>) -> Result<Option<Priority>> {
    input.map(str::parse).transpose()
}
