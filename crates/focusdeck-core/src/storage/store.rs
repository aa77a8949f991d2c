//! Typed JSON-blob layer over the kv table.
//!
//! Loads are tolerant by contract: a missing key or a blob that fails to
//! parse yields `None` and the caller falls back to defaults. Corrupt
//! persisted state must never be fatal.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

use super::database::Database;

/// Well-known kv keys for engine state blobs.
pub mod keys {
    /// Pomodoro run state + cycle count.
    pub const POMODORO_STATE: &str = "pomodoro.state";
    /// Pomodoro settings.
    pub const POMODORO_SETTINGS: &str = "pomodoro.settings";
    /// The active task-focus session, segments included.
    pub const FOCUS_SESSION: &str = "focus.session";
}

/// Generic load/save of serializable state blobs.
///
/// Each engine opens its own `StateStore` (its own SQLite connection);
/// execution is single-threaded and the engines share no state.
pub struct StateStore {
    db: Database,
}

impl StateStore {
    /// Open the store in the default data directory.
    ///
    /// # Errors
    /// Returns an error if the underlying database cannot be opened.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open()?,
        })
    }

    /// Open the store at an explicit database path.
    pub fn open_at(path: &std::path::Path) -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open_at(path)?,
        })
    }

    /// Open an in-memory store (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: Database::open_memory()?,
        })
    }

    /// Load the blob under `key`, or `None` if absent or unparseable.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.db.kv_get(key).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    /// Persist `value` as a JSON blob under `key`.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::EncodeFailed {
            key: key.to_string(),
            source,
        })?;
        self.db.kv_set(key, &raw)
    }

    /// Remove the blob under `key`. Missing keys are not an error.
    pub fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.db.kv_delete(key)
    }

    /// Access the underlying database (interval history lives there too).
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Blob {
        count: u32,
        label: String,
    }

    #[test]
    fn save_load_roundtrip() {
        let store = StateStore::open_memory().unwrap();
        let blob = Blob {
            count: 3,
            label: "deep work".into(),
        };
        store.save("pomodoro.state", &blob).unwrap();
        assert_eq!(store.load::<Blob>("pomodoro.state"), Some(blob));
    }

    #[test]
    fn missing_key_loads_none() {
        let store = StateStore::open_memory().unwrap();
        assert_eq!(store.load::<Blob>("focus.session"), None);
    }

    #[test]
    fn corrupt_blob_loads_none() {
        let store = StateStore::open_memory().unwrap();
        store
            .database()
            .kv_set("pomodoro.state", "{not valid json")
            .unwrap();
        assert_eq!(store.load::<Blob>("pomodoro.state"), None);
    }

    #[test]
    fn clear_removes_blob() {
        let store = StateStore::open_memory().unwrap();
        let blob = Blob {
            count: 1,
            label: String::new(),
        };
        store.save("focus.session", &blob).unwrap();
        store.clear("focus.session").unwrap();
        assert_eq!(store.load::<Blob>("focus.session"), None);
    }
}
