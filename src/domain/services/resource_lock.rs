use crate::domain::entities::{
    CommitOutcome, InvalidIdentifier, LockKey, LockOutcome, LockScope, PrincipalId, ResourceId,
};
use crate::domain::ports::lock_cache::{CacheError, LockCache};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);
/// Longest TTL a lock may be configured with (one week).
pub const MAX_LOCK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("invalid lock request: {0}")]
    InvalidRequest(#[from] InvalidIdentifier),
    #[error(transparent)]
    CacheUnavailable(#[from] CacheError),
    #[error("lock record {key} holds an invalid principal id {value:?}")]
    CorruptRecord { key: String, value: String },
}

/// Failure of a commit. `Action` carries the caller's own error untouched.
#[derive(Debug, Error)]
pub enum CommitError<E> {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("commit action failed: {0}")]
    Action(E),
}

/// Short-lived, renewable, per-resource lock kept in a shared cache.
///
/// The manager holds no state of its own: every call reads and writes the
/// injected cache, so any number of server instances sharing that cache see
/// the same locks. Cache failures are returned as errors and never turn into
/// a grant or a denial.
#[derive(Clone)]
pub struct ResourceLockManager {
    cache: Arc<dyn LockCache>,
    scope: LockScope,
    ttl: Duration,
}

impl ResourceLockManager {
    pub fn new(cache: Arc<dyn LockCache>, scope: LockScope, ttl: Duration) -> Self {
        Self { cache, scope, ttl }
    }

    pub fn scope(&self) -> &LockScope {
        &self.scope
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Acquire or renew the lock on `resource_id` for `principal_id`.
    ///
    /// Granted when the lock is free or already ours; the TTL is reset in
    /// both cases. Denied, with the record left untouched, when another
    /// principal holds it.
    pub async fn begin_exclusive_access(
        &self,
        resource_id: &str,
        principal_id: &str,
    ) -> Result<LockOutcome, LockError> {
        let resource = ResourceId::parse(resource_id)?;
        let principal = PrincipalId::parse(principal_id)?;
        let key = self.scope.key_for(&resource);

        let foreign = self
            .cache
            .claim(key.as_str(), principal.as_str(), self.ttl)
            .await
            .map_err(|e| self.cache_failure("begin", &key, e))?;

        match foreign {
            None => {
                self.record("begin", "granted");
                tracing::debug!(
                    scope = %self.scope,
                    resource_id = %resource,
                    principal_id = %principal,
                    ttl_secs = self.ttl.as_secs(),
                    "Lock granted"
                );
                Ok(LockOutcome::Granted)
            }
            Some(holder) => {
                let holder = parse_holder(&key, holder)?;
                self.record("begin", "denied");
                tracing::info!(
                    scope = %self.scope,
                    resource_id = %resource,
                    principal_id = %principal,
                    holder_id = %holder,
                    "Lock denied, held by another principal"
                );
                Ok(LockOutcome::Denied { holder })
            }
        }
    }

    /// Re-check the lock, run `action`, and release the lock once the action
    /// has succeeded.
    ///
    /// The lock is read again here rather than trusting an earlier begin: it
    /// may have expired and been taken by someone else in between. An absent
    /// lock does not block the commit. When `action` fails the lock is kept so
    /// the same principal can retry.
    pub async fn commit_exclusive_action<T, E, F, Fut>(
        &self,
        resource_id: &str,
        principal_id: &str,
        action: F,
    ) -> Result<CommitOutcome<T>, CommitError<E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
    {
        let resource = ResourceId::parse(resource_id).map_err(LockError::from)?;
        let principal = PrincipalId::parse(principal_id).map_err(LockError::from)?;
        let key = self.scope.key_for(&resource);

        let current = self
            .cache
            .get(key.as_str())
            .await
            .map_err(|e| self.cache_failure("commit", &key, e))?;

        if let Some(holder) = current {
            if holder != principal.as_str() {
                let holder = parse_holder(&key, holder)?;
                self.record("commit", "denied");
                tracing::info!(
                    scope = %self.scope,
                    resource_id = %resource,
                    principal_id = %principal,
                    holder_id = %holder,
                    "Commit refused, lock expired and was taken by another principal"
                );
                return Ok(CommitOutcome::Denied { holder });
            }
        }

        let value = match action().await {
            Ok(value) => value,
            Err(e) => {
                self.record("commit", "action_failed");
                tracing::warn!(
                    scope = %self.scope,
                    resource_id = %resource,
                    principal_id = %principal,
                    "Commit action failed, lock retained"
                );
                return Err(CommitError::Action(e));
            }
        };

        // The mutation already happened; a failed release only leaves a
        // record that expires on its own. A lock taken by someone else while
        // the action ran stays with its new holder.
        match self.cache.release(key.as_str(), principal.as_str()).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                scope = %self.scope,
                key = %key,
                principal_id = %principal,
                "No lock of ours to release after commit"
            ),
            Err(e) => tracing::warn!(
                scope = %self.scope,
                key = %key,
                error = %e,
                "Failed to release lock after commit"
            ),
        }

        self.record("commit", "committed");
        tracing::debug!(
            scope = %self.scope,
            resource_id = %resource,
            principal_id = %principal,
            "Commit applied and lock released"
        );
        Ok(CommitOutcome::Committed(value))
    }

    /// Of `resource_ids`, return those currently locked by someone other than
    /// `principal_id`. Always exactly one `get_many` against the cache.
    pub async fn query_locked_by<I, S>(
        &self,
        resource_ids: I,
        principal_id: &str,
    ) -> Result<BTreeSet<ResourceId>, LockError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let principal = PrincipalId::parse(principal_id)?;
        self.query_locks(resource_ids, Some(&principal)).await
    }

    /// Of `resource_ids`, return those locked by anyone. Used for anonymous
    /// readers, for whom every live lock is foreign. One `get_many`, like
    /// `query_locked_by`.
    pub async fn query_locked<I, S>(&self, resource_ids: I) -> Result<BTreeSet<ResourceId>, LockError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.query_locks(resource_ids, None).await
    }

    async fn query_locks<I, S>(
        &self,
        resource_ids: I,
        principal: Option<&PrincipalId>,
    ) -> Result<BTreeSet<ResourceId>, LockError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key_map: HashMap<String, ResourceId> = HashMap::new();
        for raw in resource_ids {
            let resource = ResourceId::parse(raw.as_ref())?;
            let key = self.scope.key_for(&resource);
            key_map.insert(key.as_str().to_string(), resource);
        }
        let keys: Vec<String> = key_map.keys().cloned().collect();

        let active = self.cache.get_many(&keys).await.map_err(|e| {
            self.record("query", "cache_unavailable");
            tracing::error!(scope = %self.scope, keys = keys.len(), error = %e, "Bulk lock query failed");
            LockError::CacheUnavailable(e)
        })?;

        let locked: BTreeSet<ResourceId> = active
            .into_iter()
            .filter(|(_, holder)| principal.map_or(true, |p| holder != p.as_str()))
            .filter_map(|(key, _)| key_map.remove(&key))
            .collect();

        self.record("query", "ok");
        tracing::debug!(
            scope = %self.scope,
            principal_id = principal.map(PrincipalId::as_str).unwrap_or("anonymous"),
            requested = keys.len(),
            locked_by_others = locked.len(),
            "Bulk lock status queried"
        );
        Ok(locked)
    }

    fn cache_failure(&self, operation: &'static str, key: &LockKey, err: CacheError) -> LockError {
        self.record(operation, "cache_unavailable");
        tracing::error!(
            scope = %self.scope,
            key = %key,
            backend = self.cache.backend_name(),
            error = %err,
            "Lock cache unavailable"
        );
        LockError::CacheUnavailable(err)
    }

    fn record(&self, operation: &'static str, outcome: &'static str) {
        metrics::counter!(
            "resource_lock_operations_total",
            "scope" => self.scope.as_str().to_string(),
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
    }
}

fn parse_holder(key: &LockKey, value: String) -> Result<PrincipalId, LockError> {
    PrincipalId::parse(&value).map_err(|_| LockError::CorruptRecord {
        key: key.as_str().to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::lock_cache::CacheResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cache that is down: every call fails and is counted.
    #[derive(Default)]
    struct DownCache {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LockCache for DownCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> CacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn get_many(&self, _keys: &[String]) -> CacheResult<HashMap<String, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Unavailable("connection refused".into()))
        }

        fn backend_name(&self) -> &'static str {
            "down"
        }
    }

    fn manager(cache: Arc<dyn LockCache>) -> ResourceLockManager {
        ResourceLockManager::new(cache, LockScope::post(), DEFAULT_LOCK_TTL)
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected_before_cache() {
        let cache = Arc::new(DownCache::default());
        let locks = manager(cache.clone());

        assert!(matches!(
            locks.begin_exclusive_access("", "u1").await,
            Err(LockError::InvalidRequest(_))
        ));
        assert!(matches!(
            locks.begin_exclusive_access("1", "has space").await,
            Err(LockError::InvalidRequest(_))
        ));
        assert!(matches!(
            locks
                .commit_exclusive_action("1", "", || async { Ok::<_, String>(()) })
                .await,
            Err(CommitError::Lock(LockError::InvalidRequest(_)))
        ));
        assert!(matches!(
            locks.query_locked_by(["1", ""], "u1").await,
            Err(LockError::InvalidRequest(_))
        ));

        assert_eq!(cache.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_outage_fails_closed() {
        let locks = manager(Arc::new(DownCache::default()));

        assert!(matches!(
            locks.begin_exclusive_access("1", "u1").await,
            Err(LockError::CacheUnavailable(_))
        ));
        assert!(matches!(
            locks.query_locked_by(["1", "2"], "u1").await,
            Err(LockError::CacheUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_outage_skips_commit_action() {
        let locks = manager(Arc::new(DownCache::default()));
        let ran = AtomicUsize::new(0);
        let ran_ref = &ran;

        let result = locks
            .commit_exclusive_action("1", "u1", move || async move {
                ran_ref.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;

        assert!(matches!(
            result,
            Err(CommitError::Lock(LockError::CacheUnavailable(_)))
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_holder_is_reported() {
        use crate::infrastructure::cache::InMemoryLockCache;

        let cache = Arc::new(InMemoryLockCache::new());
        cache
            .set("lock_post_1", "bad holder", DEFAULT_LOCK_TTL)
            .await
            .unwrap();
        let locks = manager(cache);

        assert!(matches!(
            locks.begin_exclusive_access("1", "u1").await,
            Err(LockError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = LockError::CacheUnavailable(CacheError::Unavailable("timeout".into()));
        assert_eq!(err.to_string(), "lock cache unavailable: timeout");

        let err: CommitError<String> = CommitError::Action("disk full".into());
        assert_eq!(err.to_string(), "commit action failed: disk full");
    }
}
