use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::provider::TrackerFilter;
use crate::AppError;

/// User preferences that outlive the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub onboarding_completed: bool,
    pub filter: TrackerFilter,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Io(io) => AppError::new("SETTINGS/IO", "Could not access settings")
                .with_cause(AppError::from(io)),
            SettingsError::Json(json) => {
                AppError::new("SETTINGS/MALFORMED", "Settings file is not valid")
                    .with_cause(AppError::from(json))
            }
        }
    }
}

pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Pretty JSON in one file, replaced atomically on save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Option<Settings>>,
}

impl MemoryStore {
    // Poisoning is ignored: every write replaces the whole value.
    fn slot(&self) -> MutexGuard<'_, Option<Settings>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Settings>, SettingsError> {
        Ok(self.slot().clone())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        *self.slot() = Some(settings.clone());
        Ok(())
    }
}

/// Shared access to whichever store backs the settings.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<dyn SettingsStore>,
}

impl SettingsHandle {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(JsonFileStore::new(path)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    /// Current settings. Unreadable or malformed storage yields defaults.
    pub fn load(&self) -> Settings {
        match self.inner.load() {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(err) => {
                warn!(target: "tracker", event = "settings_load_failed", error = %err);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), AppError> {
        self.inner.save(settings)?;
        info!(
            target: "tracker",
            event = "settings_saved",
            onboarding_completed = settings.onboarding_completed,
            filter = %settings.filter
        );
        Ok(())
    }

    /// Load, apply `change`, save. Returns what was saved.
    pub fn update<F>(&self, change: F) -> Result<Settings, AppError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load();
        change(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().unwrap();
        let handle = SettingsHandle::file(dir.path().join("settings.json"));
        assert_eq!(handle.load(), Settings::default());
    }

    #[test]
    fn saved_settings_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        SettingsHandle::file(&path)
            .update(|s| {
                s.onboarding_completed = true;
                s.filter = TrackerFilter::Completed;
            })
            .unwrap();

        let reopened = SettingsHandle::file(&path).load();
        assert!(reopened.onboarding_completed);
        assert_eq!(reopened.filter, TrackerFilter::Completed);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(SettingsError::Json(_))));
        assert_eq!(SettingsHandle::file(&path).load(), Settings::default());
    }

    #[test]
    fn unknown_keys_and_partial_files_are_tolerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"onboardingCompleted": true, "theme": "dark"}"#).unwrap();
        let settings = SettingsHandle::file(&path).load();
        assert!(settings.onboarding_completed);
        assert_eq!(settings.filter, TrackerFilter::All);
    }

    #[test]
    fn memory_store_keeps_saving_after_a_panicking_holder() {
        let store = Arc::new(MemoryStore::default());
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.data.lock().unwrap();
            panic!("holder died");
        })
        .join();
        assert!(store.data.is_poisoned());

        let settings = Settings {
            onboarding_completed: true,
            filter: TrackerFilter::Completed,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), Some(settings));
    }

    #[test]
    fn settings_error_maps_to_app_error() {
        let err: AppError = SettingsError::Io(std::io::Error::from(ErrorKind::PermissionDenied)).into();
        assert_eq!(err.code(), "SETTINGS/IO");
        assert!(err.cause().is_some());
    }
}
