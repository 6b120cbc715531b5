//! Configuration management for `ultimate_portfolio`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`UPT_*`)
//! 3. User config (~/.config/upt/config.yaml)
//! 4. Project config (.portfolio/config.yaml)
//! 5. Defaults

use crate::controller::StoreController;
use crate::error::{Result, TrackerError};
use crate::model::DEFAULT_RECENT_DAYS;
use crate::storage::SqliteStorage;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the workspace directory.
pub const WORKSPACE_DIR_NAME: &str = ".portfolio";
/// Database filename inside the workspace directory.
pub const DEFAULT_DB_FILENAME: &str = "portfolio.db";
/// Project config filename inside the workspace directory.
pub const CONFIG_FILENAME: &str = "config.yaml";
/// Environment variable naming the workspace directory explicitly.
pub const WORKSPACE_ENV: &str = "PORTFOLIO_DIR";
/// Prefix for configuration environment variables.
const ENV_PREFIX: &str = "UPT_";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 30_000;

/// Resolved paths for this workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub workspace_dir: PathBuf,
    pub db_path: PathBuf,
}

impl ConfigPaths {
    /// Resolve the database path, honoring an explicit override.
    ///
    /// Relative overrides are taken relative to the workspace directory.
    #[must_use]
    pub fn resolve(workspace_dir: &Path, db_override: Option<&PathBuf>) -> Self {
        let db_path = match db_override {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => workspace_dir.join(path),
            None => workspace_dir.join(DEFAULT_DB_FILENAME),
        };
        Self {
            workspace_dir: workspace_dir.to_path_buf(),
            db_path,
        }
    }
}

/// Discover the active `.portfolio` directory.
///
/// Honors `PORTFOLIO_DIR` when set, otherwise walks up from `start` (or CWD).
///
/// # Errors
///
/// Returns `NotInitialized` if no workspace is found, or an I/O error if the
/// CWD cannot be read.
pub fn discover_workspace(start: Option<&Path>) -> Result<PathBuf> {
    let env_dir = env::var(WORKSPACE_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);
    discover_workspace_with_env(start, env_dir.as_deref())
}

fn discover_workspace_with_env(start: Option<&Path>, env_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = env_dir.filter(|p| p.is_dir()) {
        return Ok(path.to_path_buf());
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(WORKSPACE_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }
        if !current.pop() {
            break;
        }
    }

    Err(TrackerError::NotInitialized)
}

/// An opened store plus the settings it was opened with.
#[derive(Debug)]
pub struct StoreContext {
    pub controller: StoreController,
    pub paths: ConfigPaths,
    pub actor: String,
}

/// Open a controller for the workspace using the merged configuration.
///
/// # Errors
///
/// Returns an error if config cannot be read or the store cannot be loaded.
pub fn open_controller(workspace_dir: &Path, cli: &CliOverrides) -> Result<StoreContext> {
    let layer = load_config(workspace_dir, cli)?;
    let paths = ConfigPaths::resolve(workspace_dir, db_override_from_layer(&layer).as_ref());
    let lock_timeout = lock_timeout_from_layer(&layer)?;
    let recent_days = recent_days_from_layer(&layer)?;
    let actor = resolve_actor(&layer);

    debug!(db = %paths.db_path.display(), lock_timeout, recent_days, %actor, "Opening store");
    let storage = SqliteStorage::open_with_timeout(&paths.db_path, Some(lock_timeout))?;
    let controller = StoreController::new(storage)?.with_recent_days(recent_days);
    Ok(StoreContext {
        controller,
        paths,
        actor,
    })
}

/// A flat key/value configuration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from `UPT_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layer.set(stripped, value);
            }
        }
        layer
    }

    /// Insert a value under its normalized key.
    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(normalize_key(key), value);
    }

    /// Look up a value by key (any of `lock_timeout`, `LOCK-TIMEOUT`, ...).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }
}

/// CLI overrides for config loading.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub db: Option<PathBuf>,
    pub actor: Option<String>,
    pub lock_timeout: Option<u64>,
    pub recent_days: Option<i64>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(path) = &self.db {
            layer.set("db", path.to_string_lossy().to_string());
        }
        if let Some(actor) = &self.actor {
            layer.set("actor", actor.clone());
        }
        if let Some(lock_timeout) = self.lock_timeout {
            layer.set("lock-timeout", lock_timeout.to_string());
        }
        if let Some(days) = self.recent_days {
            layer.set("recent-days", days.to_string());
        }

        layer
    }
}

/// Load project config (.portfolio/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(workspace_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&workspace_dir.join(CONFIG_FILENAME))
}

/// Load user config (~/.config/upt/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("upt")
        .join(CONFIG_FILENAME);
    ConfigLayer::from_yaml(&path)
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set("lock-timeout", DEFAULT_LOCK_TIMEOUT_MS.to_string());
    layer.set("recent-days", DEFAULT_RECENT_DAYS.to_string());
    layer
}

/// Load configuration with the full precedence order.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(workspace_dir: &Path, cli: &CliOverrides) -> Result<ConfigLayer> {
    Ok(ConfigLayer::merge_layers(&[
        default_config_layer(),
        load_project_config(workspace_dir)?,
        load_user_config()?,
        ConfigLayer::from_env(),
        cli.as_layer(),
    ]))
}

/// Resolve the actor name, falling back to `USER` and then "unknown".
#[must_use]
pub fn resolve_actor(layer: &ConfigLayer) -> String {
    layer
        .get("actor")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| env::var("USER").ok().map(|value| value.trim().to_string()))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn db_override_from_layer(layer: &ConfigLayer) -> Option<PathBuf> {
    layer
        .get("db")
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Busy timeout in milliseconds.
///
/// # Errors
///
/// Returns a config error if the value is not a non-negative integer.
pub fn lock_timeout_from_layer(layer: &ConfigLayer) -> Result<u64> {
    layer.get("lock-timeout").map_or(Ok(DEFAULT_LOCK_TIMEOUT_MS), |value| {
        value
            .trim()
            .parse()
            .map_err(|_| TrackerError::Config(format!("lock-timeout must be milliseconds, got '{value}'")))
    })
}

/// Width of the recent-issues window in days.
///
/// # Errors
///
/// Returns a config error if the value is not a positive integer.
pub fn recent_days_from_layer(layer: &ConfigLayer) -> Result<i64> {
    let Some(value) = layer.get("recent-days") else {
        return Ok(DEFAULT_RECENT_DAYS);
    };
    match value.trim().parse::<i64>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(TrackerError::Config(format!(
            "recent-days must be a positive number of days, got '{value}'"
        ))),
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        layer.set(&key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}
