// SPDX-License-Identifier: AGPL-3.0
// PicMover Core - Failed asset tracking
//
// Remembers which assets still need to reach the server so a later
// run can retry only those. Stored in a local JSON file.

use crate::types::AppError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

/// Key the identifier list is stored under
pub const FAILURE_KEY: &str = "FailedPhotoLocalIdentifiers";

/// Where the failure set lives between runs
pub trait FailureStore: Send + Sync {
    fn load(&self) -> Result<Vec<String>, AppError>;
    fn save(&self, identifiers: &[String]) -> Result<(), AppError>;
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FailuresFile {
    #[serde(rename = "FailedPhotoLocalIdentifiers", default)]
    identifiers: Vec<String>,
}

/// File-based failure store
pub struct JsonFailureStore {
    file_path: PathBuf,
}

impl JsonFailureStore {
    /// Store in the platform data directory
    pub fn new() -> Result<Self, AppError> {
        let data_dir = directories::ProjectDirs::from("com", "picmover", "client")
            .ok_or_else(|| AppError::FileIo("Could not determine data directory".to_string()))?
            .data_dir()
            .to_path_buf();

        fs::create_dir_all(&data_dir)
            .map_err(|e| AppError::FileIo(format!("Failed to create data dir: {}", e)))?;

        Ok(Self::at(data_dir.join("failed_photos.json")))
    }

    /// Store in an explicit file
    pub fn at(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl FailureStore for JsonFailureStore {
    fn load(&self) -> Result<Vec<String>, AppError> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.file_path)
            .map_err(|e| AppError::FileIo(format!("Failed to read failed photos: {}", e)))?;

        let file: FailuresFile = serde_json::from_str(&content).map_err(|e| {
            AppError::Serialization(format!("Failed to parse failed photos: {}", e))
        })?;

        Ok(file.identifiers)
    }

    fn save(&self, identifiers: &[String]) -> Result<(), AppError> {
        let file = FailuresFile {
            identifiers: identifiers.to_vec(),
        };

        let content = serde_json::to_string_pretty(&file).map_err(|e| {
            AppError::Serialization(format!("Failed to serialize failed photos: {}", e))
        })?;

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::FileIo(format!("Failed to create data dir: {}", e)))?;
        }

        fs::write(&self.file_path, content)
            .map_err(|e| AppError::FileIo(format!("Failed to write failed photos: {}", e)))?;

        Ok(())
    }
}

/// Failure store that lives only as long as the process
#[derive(Default)]
pub struct MemoryFailureStore {
    saved: Mutex<Vec<String>>,
}

impl MemoryFailureStore {
    pub fn with_identifiers(identifiers: Vec<String>) -> Self {
        Self {
            saved: Mutex::new(identifiers),
        }
    }

    /// What the last `save` wrote
    pub fn saved(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FailureStore for MemoryFailureStore {
    fn load(&self) -> Result<Vec<String>, AppError> {
        Ok(self.saved())
    }

    fn save(&self, identifiers: &[String]) -> Result<(), AppError> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = identifiers.to_vec();
        Ok(())
    }
}

/// Set of asset identifiers that must be uploaded again
pub struct FailureTracker {
    identifiers: RwLock<HashSet<String>>,
    store: Box<dyn FailureStore>,
}

impl FailureTracker {
    /// Create a tracker, loading whatever the store holds.
    /// An unreadable store starts the tracker empty.
    pub fn new(store: impl FailureStore + 'static) -> Self {
        let tracker = Self {
            identifiers: RwLock::new(HashSet::new()),
            store: Box::new(store),
        };
        tracker.load();
        tracker
    }

    /// Tracker with no persistence
    pub fn in_memory() -> Self {
        Self::new(MemoryFailureStore::default())
    }

    /// Replace the in-memory set with the store's contents
    pub fn load(&self) {
        let loaded = match self.store.load() {
            Ok(identifiers) => identifiers,
            Err(e) => {
                tracing::warn!("Failed to load failed photos, starting fresh: {}", e);
                Vec::new()
            }
        };
        tracing::debug!("Loaded {} failed photo identifiers", loaded.len());
        *self.write() = loaded.into_iter().collect();
    }

    /// Flush the set to the store. Write failures are logged, not returned.
    pub fn save(&self) {
        if let Err(e) = self.try_save() {
            tracing::warn!("Failed to persist failed photos: {}", e);
        }
    }

    pub fn try_save(&self) -> Result<(), AppError> {
        let identifiers = self.list();
        self.store.save(&identifiers)
    }

    /// Returns true if the identifier was not already present
    pub fn add(&self, identifier: &str) -> bool {
        self.write().insert(identifier.to_string())
    }

    /// Returns true if the identifier was present
    pub fn remove(&self, identifier: &str) -> bool {
        self.write().remove(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.read().contains(identifier)
    }

    /// All identifiers, in no particular order
    pub fn list(&self) -> Vec<String> {
        self.read().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashSet<String>> {
        self.identifiers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<String>> {
        self.identifiers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let tracker = FailureTracker::in_memory();
        assert!(tracker.add("a"));
        assert!(!tracker.add("a"));
        assert_eq!(tracker.count(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let tracker = FailureTracker::in_memory();
        tracker.add("a");
        assert!(!tracker.remove("b"));
        assert_eq!(tracker.count(), 1);
        assert!(tracker.remove("a"));
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_list_returns_every_identifier() {
        let tracker = FailureTracker::in_memory();
        tracker.add("b");
        tracker.add("a");
        let mut listed = tracker.list();
        listed.sort();
        assert_eq!(listed, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_survives_restart_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");

        let tracker = FailureTracker::new(JsonFailureStore::at(&path));
        tracker.add("photo-1");
        tracker.add("photo-2");
        tracker.save();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(FAILURE_KEY));

        let reopened = FailureTracker::new(JsonFailureStore::at(&path));
        assert_eq!(reopened.count(), 2);
        assert!(reopened.contains("photo-1"));
    }

    #[test]
    fn test_unsaved_changes_do_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");

        let tracker = FailureTracker::new(JsonFailureStore::at(&path));
        tracker.add("photo-1");
        drop(tracker);

        assert_eq!(FailureTracker::new(JsonFailureStore::at(&path)).count(), 0);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.json");
        fs::write(&path, "{ not json").unwrap();

        let tracker = FailureTracker::new(JsonFailureStore::at(&path));
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_save_to_unwritable_path_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail
        let path = dir.path().join("blocked");
        fs::create_dir(&path).unwrap();

        let tracker = FailureTracker::new(JsonFailureStore::at(&path));
        tracker.add("photo-1");
        tracker.save();
        assert!(tracker.try_save().is_err());
    }
}
