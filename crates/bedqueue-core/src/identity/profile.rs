//! SQLite-backed local profile store.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::ProfileStore;

/// Profile storage errors.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Profile storage unavailable: {0}")]
    Unavailable(String),
}

pub type ProfileResult<T> = Result<T, ProfileError>;

/// Schema for the local profile database.
pub const PROFILE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Key-value settings kept on the client device.
pub struct SqliteProfileStore {
    conn: Connection,
}

impl SqliteProfileStore {
    /// Open profile database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> ProfileResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(crate::db::DEFAULT_BUSY_TIMEOUT)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Create in-memory profile (for testing).
    pub fn open_in_memory() -> ProfileResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> ProfileResult<()> {
        self.conn.execute_batch(PROFILE_SCHEMA)?;
        Ok(())
    }
}

impl ProfileStore for SqliteProfileStore {
    fn get(&self, key: &str) -> ProfileResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_settings WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn put_if_absent(&self, key: &str, value: &str) -> ProfileResult<String> {
        self.conn.execute(
            "INSERT INTO local_settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO NOTHING",
            params![key, value],
        )?;
        self.get(key)?
            .ok_or_else(|| ProfileError::Unavailable(format!("{} vanished after write", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_if_absent_keeps_first_value() {
        let store = SqliteProfileStore::open_in_memory().unwrap();

        assert_eq!(store.get("client_uuid").unwrap(), None);
        assert_eq!(store.put_if_absent("client_uuid", "a").unwrap(), "a");
        assert_eq!(store.put_if_absent("client_uuid", "b").unwrap(), "a");
        assert_eq!(store.get("client_uuid").unwrap(), Some("a".into()));
    }

    #[test]
    fn test_two_handles_converge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.db");

        let tab_one = SqliteProfileStore::open(&path).unwrap();
        let tab_two = SqliteProfileStore::open(&path).unwrap();

        let first = tab_one.put_if_absent("client_uuid", "from-tab-one").unwrap();
        let second = tab_two.put_if_absent("client_uuid", "from-tab-two").unwrap();
        assert_eq!(first, "from-tab-one");
        assert_eq!(second, "from-tab-one");
    }

    #[test]
    fn test_open_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        assert!(SqliteProfileStore::open(dir.path()).is_err());
    }
}
