//! Init command implementation.

use crate::config::{CONFIG_FILENAME, DEFAULT_DB_FILENAME, WORKSPACE_DIR_NAME};
use crate::error::{Result, TrackerError};
use crate::format::print_json;
use crate::storage::SqliteStorage;
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if a database exists and `force` is not set,
/// or an error if the directory or database cannot be created.
pub fn execute(force: bool, json: bool, root_dir: Option<&Path>) -> Result<()> {
    let base_dir = root_dir.unwrap_or_else(|| Path::new("."));
    let workspace = base_dir.join(WORKSPACE_DIR_NAME);
    let db_path = workspace.join(DEFAULT_DB_FILENAME);

    if db_path.exists() {
        if !force {
            return Err(TrackerError::AlreadyInitialized { path: db_path });
        }
        for suffix in ["", "-wal", "-shm"] {
            let path = workspace.join(format!("{DEFAULT_DB_FILENAME}{suffix}"));
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
    }
    fs::create_dir_all(&workspace)?;

    // Opening creates the file and applies the schema.
    SqliteStorage::open(&db_path)?;

    let config_path = workspace.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let config = r"# Portfolio configuration
# lock-timeout: 30000
# recent-days: 7
# actor: your-name
";
        fs::write(config_path, config)?;
    }

    let gitignore_path = workspace.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(gitignore_path, "*.db\n*.db-shm\n*.db-wal\n")?;
    }

    info!(path = %workspace.display(), "Initialized workspace");
    if json {
        print_json(&json!({ "workspace": workspace, "database": db_path }))?;
    } else {
        println!("Initialized portfolio workspace in {WORKSPACE_DIR_NAME}/");
    }
    Ok(())
}
