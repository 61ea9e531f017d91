use tracing::info;

use crate::config::AppConfig;
use crate::db::Database;
use crate::provider::{DataProvider, TrackerFilter};
use crate::settings::{Settings, SettingsHandle};
use crate::AppResult;

/// Composition root. Built once at start-up; the database and settings are
/// lent from here to everything that needs them.
pub struct AppState {
    db: Database,
    settings: SettingsHandle,
}

impl AppState {
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        let db = Database::open(&config.db_path)?;
        let settings = SettingsHandle::file(&config.settings_path);
        info!(
            target: "tracker",
            event = "app_state_ready",
            db = %config.db_path.display(),
            settings = %config.settings_path.display()
        );
        Ok(Self { db, settings })
    }

    pub fn in_memory() -> AppResult<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
            settings: SettingsHandle::in_memory(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// A facade over the stores, positioned on today with the saved filter.
    pub fn data_provider(&self) -> DataProvider<'_> {
        let mut provider = DataProvider::new(self.db.conn());
        let saved = self.settings.load().filter;
        if saved != TrackerFilter::All {
            provider.set_filter(saved);
        }
        provider
    }

    /// Remember the filter for the next start.
    pub fn remember_filter(&self, filter: TrackerFilter) -> AppResult<Settings> {
        self.settings.update(|s| s.filter = filter)
    }

    pub fn onboarding_completed(&self) -> bool {
        self.settings.load().onboarding_completed
    }

    pub fn complete_onboarding(&self) -> AppResult<Settings> {
        self.settings.update(|s| s.onboarding_completed = true)
    }
}
