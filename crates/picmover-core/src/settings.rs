// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Settings persistence
//
// Settings are stored in a local JSON file.

use crate::types::{AppError, ClientSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// In-memory cache of settings, persisted to disk on changes
pub struct SettingsStore {
    settings: RwLock<ClientSettings>,
    file_path: PathBuf,
}

impl SettingsStore {
    /// Open the settings file in the platform config directory
    pub fn new() -> Result<Self, AppError> {
        Self::at(Self::get_settings_path()?)
    }

    /// Open an explicit settings file, creating it with defaults if missing
    pub fn at(file_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let file_path = file_path.into();
        tracing::info!("Settings file path: {:?}", file_path);

        let settings = if file_path.exists() {
            let content = fs::read_to_string(&file_path)
                .map_err(|e| AppError::FileIo(format!("Failed to read settings: {}", e)))?;

            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse settings, using defaults: {}", e);
                ClientSettings::default()
            })
        } else {
            tracing::info!("No settings file found, using defaults");
            ClientSettings::default()
        };

        let store = Self {
            settings: RwLock::new(settings),
            file_path,
        };

        if !store.file_path.exists() {
            tracing::info!("Creating initial settings file");
            store.persist()?;
        }

        Ok(store)
    }

    fn get_settings_path() -> Result<PathBuf, AppError> {
        let config_dir = directories::ProjectDirs::from("com", "picmover", "client")
            .ok_or_else(|| AppError::FileIo("Could not determine config directory".to_string()))?
            .config_dir()
            .to_path_buf();

        Ok(config_dir.join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn persist(&self) -> Result<(), AppError> {
        let content = {
            let settings = self.settings.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*settings).map_err(|e| {
                AppError::Serialization(format!("Failed to serialize settings: {}", e))
            })?
        };

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::FileIo(format!("Failed to create config dir: {}", e)))?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write settings: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> ClientSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate, replace and persist the settings
    pub fn update(&self, new_settings: ClientSettings) -> Result<(), AppError> {
        new_settings.validate()?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = new_settings;

        let result = self.persist();
        if let Err(e) = &result {
            tracing::error!("Failed to persist settings: {}", e);
        }
        result
    }
}
