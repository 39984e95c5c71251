//! # State File
//!
//! Durable storage for the registry snapshot: one JSON document, replaced
//! atomically (write to a temporary sibling, then rename).
//!
//! A missing file is a fresh start. A file that cannot be decoded is logged
//! and treated as empty rather than blocking startup.

use chores_core::{ChoreError, StoreSnapshot};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the persisted snapshot, or an empty one.
    pub fn load(&self) -> StoreSnapshot {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No state file, starting fresh");
                return StoreSnapshot::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read state file, starting fresh");
                return StoreSnapshot::new();
            }
        };

        match StoreSnapshot::from_json(&text) {
            Ok(snapshot) => {
                tracing::debug!(chores = snapshot.len(), "State file loaded");
                snapshot
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt state file ignored");
                StoreSnapshot::new()
            }
        }
    }

    /// Replace the state file with `snapshot`.
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ChoreError> {
        let text = snapshot.to_json()?;
        let temp = self.temp_path();

        std::fs::write(&temp, text).map_err(|e| {
            ChoreError::IoError(format!("Cannot write '{}': {}", temp.display(), e))
        })?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            ChoreError::IoError(format!(
                "Cannot replace '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        assert!(store_in(&dir).load().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().expect("temp dir");
        let store = store_in(&dir);

        let mut snapshot = StoreSnapshot::new();
        snapshot
            .chores
            .insert("laundry".into(), json!({"chore_state": "due"}));
        store.save(&snapshot).expect("save");

        assert_eq!(store.load(), snapshot);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ not json").expect("write");

        assert!(store.load().is_empty());
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::new(dir.path().join("missing").join("state.json"));
        let result = store.save(&StoreSnapshot::new());
        assert!(matches!(result, Err(ChoreError::IoError(_))));
    }
}
