//! SQLite-backed durable store.
//!
//! Two tables:
//! - `kv` -- JSON state blobs keyed by name (run state, settings, the active
//!   focus session). The typed layer on top lives in [`super::store`].
//! - `session_log` -- completed intervals (pomodoro phases and ended focus
//!   sessions), appended by the engines so the surrounding app can list
//!   recent activity.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

use super::data_dir;

/// A completed interval as recorded in `session_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub id: i64,
    /// "focus", "short_break", "long_break", or "session".
    pub kind: String,
    pub task_id: Option<String>,
    pub duration_secs: u64,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}

/// SQLite database for engine state and interval history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focusdeck/focusdeck.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?
            .join("focusdeck.db");
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open the database at an explicit path (for tests and embedders that
    /// manage their own data directory).
    pub fn open_at(path: &std::path::Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_log (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                kind          TEXT NOT NULL,
                task_id       TEXT,
                duration_secs INTEGER NOT NULL,
                started_at_ms INTEGER NOT NULL,
                ended_at_ms   INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_session_log_ended_at ON session_log(ended_at_ms);",
        )?;
        Ok(())
    }

    /// Append a completed interval to the history log.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_interval(
        &self,
        kind: &str,
        task_id: Option<&str>,
        duration_secs: u64,
        started_at_ms: u64,
        ended_at_ms: u64,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO session_log (kind, task_id, duration_secs, started_at_ms, ended_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![kind, task_id, duration_secs, started_at_ms, ended_at_ms],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recently ended intervals, newest first.
    pub fn recent_intervals(&self, limit: usize) -> Result<Vec<IntervalRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, task_id, duration_secs, started_at_ms, ended_at_ms
             FROM session_log
             ORDER BY ended_at_ms DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(IntervalRecord {
                id: row.get(0)?,
                kind: row.get(1)?,
                task_id: row.get(2)?,
                duration_secs: row.get(3)?,
                started_at_ms: row.get(4)?,
                ended_at_ms: row.get(5)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_roundtrip_and_delete() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "world").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "world");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_delete("test").unwrap();
    }

    #[test]
    fn record_and_list_intervals() {
        let db = Database::open_memory().unwrap();
        db.record_interval("focus", Some("task-1"), 1500, 0, 1_500_000)
            .unwrap();
        db.record_interval("short_break", None, 300, 1_500_000, 1_800_000)
            .unwrap();
        let recent = db.recent_intervals(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, "short_break");
        assert_eq!(recent[1].task_id.as_deref(), Some("task-1"));
        assert_eq!(recent[1].duration_secs, 1500);
    }

    #[test]
    fn open_at_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focusdeck.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("pomodoro.state", "{}").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("pomodoro.state").unwrap().unwrap(), "{}");
    }
}
