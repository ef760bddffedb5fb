use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cache::{CacheStats, StorageBackend};
use crate::core::{MetadataRecord, Subject};

type PosterMap = HashMap<String, MetadataRecord>;

/// Poster/metadata cache persisted as one JSON blob under a single storage key.
///
/// There is no in-memory mirror: every call reads (and `put` rewrites) the
/// whole blob. Writers are serialized by `write_lock`, so concurrent puts for
/// different subjects merge instead of overwriting each other. Storage
/// failures never escape; the cache only ever degrades to "empty".
pub struct PosterCache {
    storage: Arc<dyn StorageBackend>,
    storage_key: String,
    ttl: chrono::Duration,
    write_lock: Mutex<()>,
}

impl PosterCache {
    pub fn new(storage: Arc<dyn StorageBackend>, storage_key: impl Into<String>, ttl: chrono::Duration) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
            ttl,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the cache and run the schema migration before first use
    pub async fn open(storage: Arc<dyn StorageBackend>, storage_key: impl Into<String>, ttl: chrono::Duration) -> Self {
        let cache = Self::new(storage, storage_key, ttl);
        cache.migrate().await;
        cache
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Discard the whole blob if it is unreadable or holds any record from
    /// before genre support. Returns whether anything was discarded.
    pub async fn migrate(&self) -> bool {
        let _guard = self.write_lock.lock().await;

        let raw = match self.storage.get_item(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Poster cache unreadable during migration: {}", e);
                return false;
            }
        };

        let outdated = match serde_json::from_str::<PosterMap>(&raw) {
            Ok(map) => map.values().any(MetadataRecord::is_legacy),
            Err(_) => true,
        };

        if outdated {
            tracing::info!("🧹 Discarding poster cache written by an older schema");
            self.reset().await;
        }

        outdated
    }

    /// Cached record for `subject`; absent on any storage problem
    pub async fn get(&self, subject: &Subject) -> Option<MetadataRecord> {
        match self.read_map().await {
            Ok(mut map) => map.remove(&subject.cache_key()),
            Err(_) => {
                // re-read under the write lock before discarding anything
                self.migrate().await;
                None
            }
        }
    }

    /// Merge `record` under the subject's key and persist the whole map.
    /// Persist failures are logged and ignored.
    pub async fn put(&self, subject: &Subject, record: MetadataRecord) {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load_map().await;
        map.insert(subject.cache_key(), record);
        self.save_map(&map).await;
    }

    pub fn is_fresh(&self, record: &MetadataRecord, now: DateTime<Utc>) -> bool {
        record.is_fresh(now, self.ttl)
    }

    /// Drop entries older than the TTL; returns how many were removed
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let _guard = self.write_lock.lock().await;

        let mut map = self.load_map().await;
        let before = map.len();
        map.retain(|_, record| self.is_fresh(record, now));
        let removed = before - map.len();

        if removed > 0 {
            self.save_map(&map).await;
        }

        removed
    }

    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        self.reset().await;
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> CacheStats {
        let raw = self
            .storage
            .get_item(&self.storage_key)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let map: PosterMap = serde_json::from_str(&raw).unwrap_or_default();

        let fresh = map.values().filter(|r| self.is_fresh(r, now)).count() as u64;
        let total = map.len() as u64;

        CacheStats {
            total_entries: total,
            fresh_entries: fresh,
            stale_entries: total - fresh,
            blob_bytes: raw.len(),
            oldest_entry: map.values().map(|r| r.saved_at).min(),
            newest_entry: map.values().map(|r| r.saved_at).max(),
        }
    }

    /// Read the blob without side effects. Storage problems read as empty.
    async fn read_map(&self) -> serde_json::Result<PosterMap> {
        let raw = match self.storage.get_item(&self.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(PosterMap::new()),
            Err(e) => {
                tracing::debug!("Poster cache read failed: {}", e);
                return Ok(PosterMap::new());
            }
        };

        serde_json::from_str(&raw)
    }

    /// Caller holds `write_lock`. A malformed blob is removed and treated as empty.
    async fn load_map(&self) -> PosterMap {
        match self.read_map().await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("Poster cache is malformed ({}), resetting", e);
                self.reset().await;
                PosterMap::new()
            }
        }
    }

    async fn save_map(&self, map: &PosterMap) {
        let blob = match serde_json::to_string(map) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("Failed to serialize poster cache: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&self.storage_key, &blob).await {
            tracing::warn!("Failed to persist poster cache: {}", e);
        }
    }

    async fn reset(&self) {
        if let Err(e) = self.storage.remove_item(&self.storage_key).await {
            tracing::warn!("Failed to reset poster cache: {}", e);
        }
    }
}
