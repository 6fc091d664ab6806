//! Worklog configuration management
//! Handles loading and saving the YAML config file

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::Location;

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "WORKLOG_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Database path, `~` is expanded
    #[serde(default = "default_db_path")]
    pub database_path: String,

    /// Apply pending migrations before running a command
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,

    /// Location used when a command does not name one
    #[serde(default = "default_location")]
    pub default_location: Location,
}

fn default_db_path() -> String {
    "~/.worklog/worklog.db".to_string()
}

fn default_auto_migrate() -> bool {
    true
}

fn default_location() -> Location {
    Location::Office
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            auto_migrate: default_auto_migrate(),
            default_location: default_location(),
        }
    }
}

impl Config {
    /// Load config from the default location or specified path
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = Self::config_path(path)?;

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&raw).context("Failed to parse config file")?;

        debug!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = Self::config_path(path)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(&self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the config file path
    fn config_path(path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(env_path));
        }

        let home = dirs::home_dir().context("Cannot find home directory")?;
        Ok(home.join(".worklog").join("config.yml"))
    }

    /// Resolve database path (expand ~)
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match self.database_path.strip_prefix("~") {
            Some(rest) => {
                let home = dirs::home_dir().context("Cannot find home directory")?;
                Ok(home.join(rest.trim_start_matches(['/', '\\'])))
            }
            None => Ok(PathBuf::from(&self.database_path)),
        }
    }
}
