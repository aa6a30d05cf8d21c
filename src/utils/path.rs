//! Where locdb keeps its files
//!
//! Two directories are involved: one for `config.yaml` and one for the
//! database itself (`location.db`, plus the `.download` and `.part` files the
//! downloader stages next to it). Each can be pinned through the environment;
//! otherwise the platform defaults from `dirs` are used.

use crate::error::{LocError, Result};
use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "locdb-rs";

/// Default file name of the database inside the data directory
pub const DATABASE_FILE: &str = "location.db";

/// Checked in order before falling back to `dirs::config_dir()/locdb-rs`
const CONFIG_VARS: [&str; 2] = ["LOCDB_CONFIG_HOME", "LOCDB_HOME"];

/// Checked in order before falling back to `dirs::data_dir()/locdb-rs`
const DATA_VARS: [&str; 2] = ["LOCDB_DB_HOME", "LOCDB_HOME"];

/// First non-empty override among `vars`, else `fallback` joined with the app directory
fn resolve_dir<F>(lookup: F, vars: &[&str], fallback: Option<PathBuf>) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    vars.iter()
        .filter_map(|var| lookup(*var))
        .find(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| fallback.map(|base| base.join(APP_DIR)))
}

fn env_lookup(var: &str) -> Option<String> {
    env::var(var).ok()
}

/// Directory holding `config.yaml`
pub fn config_dir() -> Result<PathBuf> {
    resolve_dir(env_lookup, &CONFIG_VARS, dirs::config_dir())
        .ok_or_else(|| LocError::config("Cannot determine configuration directory"))
}

/// Directory holding the database and its staging files
pub fn data_dir() -> Result<PathBuf> {
    resolve_dir(env_lookup, &DATA_VARS, dirs::data_dir())
        .ok_or_else(|| LocError::config("Cannot determine data directory"))
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yaml"))
}

/// Database location used when the config leaves `database.path` empty
pub fn database_file() -> Result<PathBuf> {
    Ok(data_dir()?.join(DATABASE_FILE))
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| LocError::config(format!("Failed to create {}: {}", path.display(), e)))?;
    }
    Ok(())
}

/// Create both directories so the first run can write its default config
pub fn ensure_app_dirs() -> Result<()> {
    ensure_dir(&config_dir()?)?;
    ensure_dir(&data_dir()?)?;
    Ok(())
}

/// `~/...` in a configured database path
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
