//! Cache backends with per-key TTL.
//!
//! - `MemoryCache`: in-process, backed by moka
//! - `PersistentCache`: a `MemoryCache` in front of the store's
//!   `cache_entries` table, so values outlive the process

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

use crate::storage::{CacheBackend, SqliteStore};

#[derive(Debug, Clone)]
struct CachedValue {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Key → JSON value cache where every key carries its own TTL.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, CachedValue>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await.map(|cached| cached.value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.inner
            .insert(key.to_string(), CachedValue { value, ttl })
            .await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Write-through cache persisted in SQLite.
///
/// Reads hit memory first and fall back to the table; a storage failure is
/// logged and treated as a miss.
#[derive(Clone)]
pub struct PersistentCache {
    memory: MemoryCache,
    store: Arc<SqliteStore>,
}

impl PersistentCache {
    pub fn new(store: Arc<SqliteStore>, max_capacity: u64) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity),
            store,
        }
    }
}

#[async_trait]
impl CacheBackend for PersistentCache {
    async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.memory.get(key).await {
            return Some(value);
        }
        let now = now_ms();
        match self.store.cache_get(key, now) {
            Ok(Some((value, expires_at))) => {
                let remaining = Duration::from_millis(u64::try_from(expires_at - now).unwrap_or(0));
                self.memory.set(key, value.clone(), remaining).await;
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("Cache read of '{}' failed: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_ms().saturating_add(ttl_ms);
        if let Err(e) = self.store.cache_set(key, &value, expires_at) {
            log::warn!("Cache write of '{}' failed: {}", key, e);
        }
        self.memory.set(key, value, ttl).await;
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.store.cache_delete(key) {
            log::warn!("Cache delete of '{}' failed: {}", key, e);
        }
        self.memory.delete(key).await;
    }
}
