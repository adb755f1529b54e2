//! SQLite-backed cache storage that survives between runs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{CacheError, CacheResult, CacheStore};

/// Disk-backed cache storage in a single SQLite table.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `db_path`.
    pub fn open(db_path: &Path) -> CacheResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Database(e.to_string()))?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transcription_cache (
                image_uuid TEXT PRIMARY KEY,
                versions TEXT NOT NULL,
                stored_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT versions FROM transcription_cache WHERE image_uuid = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO transcription_cache (image_uuid, versions, stored_at)
               VALUES (?1, ?2, CURRENT_TIMESTAMP)"#,
            params![key, value],
        )?;
        Ok(())
    }

    fn len(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transcription_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear(&self) -> CacheResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM transcription_cache", [])?;
        Ok(())
    }
}
