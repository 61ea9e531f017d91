use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

pub const DB_ENV: &str = "TRACKER_DB";
pub const SETTINGS_ENV: &str = "TRACKER_SETTINGS";
pub const LOG_ENV: &str = "TRACKER_LOG";
pub const DEFAULT_LOG_FILTER: &str = "tracker=info";

const APP_DIR: &str = "tracker";
const DB_FILE: &str = "tracker.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Where the process keeps its data and how loud it logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub settings_path: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    /// Environment overrides first, then the platform data directory.
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| env::var(key).ok(), dirs::data_dir())
    }

    fn resolve<F>(var: F, data_dir: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| var(key).filter(|value| !value.trim().is_empty());
        let base = || {
            data_dir
                .clone()
                .or_else(|| env::current_dir().ok())
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| anyhow!("failed to resolve application data directory"))
        };

        let db_path = match lookup(DB_ENV) {
            Some(path) => PathBuf::from(path),
            None => base()?.join(DB_FILE),
        };
        let settings_path = match lookup(SETTINGS_ENV) {
            Some(path) => PathBuf::from(path),
            None => base()?.join(SETTINGS_FILE),
        };
        let log_filter = lookup(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            db_path,
            settings_path,
            log_filter,
        })
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }
}
