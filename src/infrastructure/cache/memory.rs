use crate::domain::ports::clock::{Clock, SystemClock};
use crate::domain::ports::lock_cache::{CacheResult, LockCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-local lock cache.
///
/// Only shares locks between workers of one process; use the database or
/// Redis backend when running more than one instance. Expired entries read
/// as absent and are dropped on the next write touching them or by
/// `purge_expired`.
#[derive(Clone)]
pub struct InMemoryLockCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLockCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, live or not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryLockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockCache for InMemoryLockCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expires_at = self.expiry(ttl);
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, String>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                entries
                    .get(key)
                    .filter(|entry| entry.is_live(now))
                    .map(|entry| (key.clone(), entry.value.clone()))
            })
            .collect())
    }

    async fn claim(&self, key: &str, holder: &str, ttl: Duration) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut entries = self.entries.write().await;

        if let Some(current) = entries.get(key).filter(|entry| entry.is_live(now)) {
            if current.value != holder {
                return Ok(Some(current.value.clone()));
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: holder.to_string(),
                expires_at,
            },
        );
        Ok(None)
    }

    async fn release(&self, key: &str, holder: &str) -> CacheResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == holder => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
