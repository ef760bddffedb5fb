use rusqlite::{Connection, params, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use async_trait::async_trait;
use chrono::Utc;

use crate::cache::StorageBackend;
use crate::error::{Result, AtlasError};

/// SQLite-backed key/value storage
///
/// Schema:
/// ```sql
/// CREATE TABLE kv_store (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL,
///     updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
/// );
/// ```
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    quota_bytes: Option<usize>,
}

impl SqliteStorage {
    /// Open (or create) the store at `db_path`; `:memory:` works for tests
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            quota_bytes: None,
        })
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AtlasError::Cache("sqlite connection mutex poisoned".to_string()))
    }

    /// Bytes stored under every key except `key`
    fn size_excluding(conn: &Connection, key: &str) -> Result<usize> {
        let size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store WHERE key != ?",
            params![key],
            |row| row.get(0),
        )?;
        Ok(size.max(0) as usize)
    }
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;

        if let Some(quota) = self.quota_bytes {
            let size = Self::size_excluding(&conn, key)? + key.len() + value.len();
            if size > quota {
                return Err(AtlasError::QuotaExceeded { size, quota });
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}
