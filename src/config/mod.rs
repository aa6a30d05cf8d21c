//! Configuration module for locdb-rs
//!
//! Handles loading and managing configuration from YAML files and environment variables.

use crate::database::{AccessMode, ReaderOptions};
use crate::error::{LocError, Result};
use crate::utils::path;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the IPFire project publishes the current database
pub const DEFAULT_DATABASE_URL: &str = "https://location.ipfire.org/databases/1/location.db.xz";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub global: GlobalConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; empty means `<data_dir>/location.db`
    #[serde(default)]
    pub path: String,

    /// Download source
    #[serde(default = "default_url")]
    pub url: String,

    /// A local file younger than this is used without asking the server
    #[serde(default = "default_freshness_hours")]
    pub freshness_hours: u64,

    /// Report uncovered addresses and unknown AS names as errors
    #[serde(default = "default_true")]
    pub raise_on_failure: bool,

    /// Memory map the file instead of seeking
    #[serde(default)]
    pub use_mmap: bool,

    /// Trie node cache capacity, 0 disables it
    #[serde(default = "default_node_cache_size")]
    pub node_cache_size: usize,

    /// Refresh the file before first use
    #[serde(default = "default_true")]
    pub auto_update: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub enable_colors: bool,

    /// Output in JSON format
    #[serde(default)]
    pub json: bool,
}

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Verbose logging
    #[serde(default)]
    pub verbose: bool,

    /// Custom config path
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_freshness_hours() -> u64 {
    24
}

fn default_node_cache_size() -> usize {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            url: default_url(),
            freshness_hours: default_freshness_hours(),
            raise_on_failure: true,
            use_mmap: false,
            node_cache_size: default_node_cache_size(),
            auto_update: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enable_colors: true,
            json: false,
        }
    }
}

/// Parse the usual spellings of a boolean environment value
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        path::ensure_app_dirs()?;

        let config_file = path::config_file()?;

        let mut config = if config_file.exists() {
            Self::from_file(&config_file)?
        } else {
            let config = Self::default();
            config.save(&config_file)?;
            config
        };
        config.global.config_path = Some(config_file);

        config.apply_env();

        Ok(config)
    }

    /// Read one YAML file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| LocError::config(format!("Failed to read config file: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| LocError::YamlError(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self) {
        if let Ok(val) = env::var("LOCDB_PATH") {
            self.database.path = val;
        }
        if let Ok(val) = env::var("LOCDB_URL") {
            self.database.url = val;
        }
        if let Ok(val) = env::var("LOCDB_RAISE_ON_FAILURE") {
            match parse_bool(&val) {
                Some(raise) => self.database.raise_on_failure = raise,
                None => log::warn!("Ignoring LOCDB_RAISE_ON_FAILURE={:?}", val),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| LocError::YamlError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, yaml).map_err(|e| LocError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Resolved database file location
    pub fn database_path(&self) -> Result<PathBuf> {
        if self.database.path.is_empty() {
            path::database_file()
        } else {
            Ok(path::expand_tilde(&self.database.path))
        }
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.database.freshness_hours * 3600)
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            raise_on_failure: self.database.raise_on_failure,
            access: if self.database.use_mmap {
                AccessMode::Mmap
            } else {
                AccessMode::Seek
            },
            node_cache_size: self.database.node_cache_size,
        }
    }
}
