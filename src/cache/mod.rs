pub mod memory;
pub mod poster;
pub mod sqlite;

use async_trait::async_trait;
use crate::error::Result;

pub use memory::MemoryStorage;
pub use poster::PosterCache;
pub use sqlite::SqliteStorage;

/// String key/value store with browser-storage semantics
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite `key`. Fails with `QuotaExceeded` when the store is full.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key` (no-op when absent)
    async fn remove_item(&self, key: &str) -> Result<()>;
}

/// Poster cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub total_entries: u64,
    pub fresh_entries: u64,
    pub stale_entries: u64,
    pub blob_bytes: usize,
    pub oldest_entry: Option<chrono::DateTime<chrono::Utc>>,
    pub newest_entry: Option<chrono::DateTime<chrono::Utc>>,
}
