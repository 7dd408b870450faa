use async_trait::async_trait;
use postlock::domain::ports::lock_cache::{CacheResult, LockCache};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps another cache and counts every call made through it.
pub struct CountingCache {
    inner: Arc<dyn LockCache>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
    pub get_manys: AtomicUsize,
    pub claims: AtomicUsize,
    pub releases: AtomicUsize,
}

impl CountingCache {
    pub fn new(inner: Arc<dyn LockCache>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            get_manys: AtomicUsize::new(0),
            claims: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
            + self.sets.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.get_manys.load(Ordering::SeqCst)
            + self.claims.load(Ordering::SeqCst)
            + self.releases.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        for counter in [
            &self.gets,
            &self.sets,
            &self.deletes,
            &self.get_manys,
            &self.claims,
            &self.releases,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl LockCache for CountingCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, String>> {
        self.get_manys.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(keys).await
    }

    async fn claim(&self, key: &str, holder: &str, ttl: Duration) -> CacheResult<Option<String>> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        self.inner.claim(key, holder, ttl).await
    }

    async fn release(&self, key: &str, holder: &str) -> CacheResult<bool> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(key, holder).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}
