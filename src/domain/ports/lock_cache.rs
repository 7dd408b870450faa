use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("lock cache unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shared key-value store with per-entry TTL that backs resource locks.
///
/// Entries whose TTL has elapsed must behave exactly like absent keys for
/// every operation.
#[async_trait]
pub trait LockCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous value and resetting the TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Fetch several keys in a single round trip. Only keys that currently
    /// exist appear in the returned map.
    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, String>>;

    /// Store `holder` under `key` if the key is absent or already holds
    /// `holder`. Returns the foreign holder when someone else has the key.
    ///
    /// The provided body is a plain get-then-set and therefore racy; backends
    /// with a conditional write override it with an atomic version.
    async fn claim(&self, key: &str, holder: &str, ttl: Duration) -> CacheResult<Option<String>> {
        match self.get(key).await? {
            Some(current) if current != holder => Ok(Some(current)),
            _ => {
                self.set(key, holder, ttl).await?;
                Ok(None)
            }
        }
    }

    /// Remove `key` only while it still holds `holder`. Returns whether a
    /// record was removed; a foreign or missing record is left untouched.
    ///
    /// Like `claim`, the provided body is get-then-delete and backends
    /// override it with a compare-and-delete.
    async fn release(&self, key: &str, holder: &str) -> CacheResult<bool> {
        match self.get(key).await? {
            Some(current) if current == holder => {
                self.delete(key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str;
}
