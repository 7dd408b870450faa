use crate::application::services::PostService;
use crate::config::{Config, LockBackend};
use crate::domain::entities::LockScope;
use crate::domain::ports::lock_cache::LockCache;
use crate::domain::ports::post_repository::PostRepository;
use crate::domain::services::ResourceLockManager;
use crate::infrastructure::cache::{DatabaseLockCache, InMemoryLockCache, RedisLockCache};
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the lock cache selected by `LOCK_BACKEND`.
///
/// Memory and database backends get a background task that removes expired
/// entries; Redis expires keys itself.
pub async fn build_lock_cache(db: &Database, config: &Config) -> anyhow::Result<Arc<dyn LockCache>> {
    let cache: Arc<dyn LockCache> = match config.lock_backend {
        LockBackend::Memory => {
            let cache = InMemoryLockCache::new();
            let purger = cache.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    let removed = purger.purge_expired().await;
                    if removed > 0 {
                        tracing::debug!("Purged {} expired in-memory locks", removed);
                    }
                }
            });
            tracing::warn!("Using in-memory lock cache; locks are not shared between instances");
            Arc::new(cache)
        }
        LockBackend::Database => {
            let cache = DatabaseLockCache::new(db.clone());
            let purger = cache.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    match purger.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!("Purged {} expired lock entries", removed),
                        Err(e) => tracing::error!("Failed to purge lock entries: {}", e),
                    }
                }
            });
            Arc::new(cache)
        }
        LockBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis lock backend")?;
            let cache = RedisLockCache::connect(url, crate::infrastructure::cache::redis::DEFAULT_REDIS_TIMEOUT)
                .await
                .context("failed to initialize redis lock cache")?;
            Arc::new(cache)
        }
    };

    tracing::info!(
        "Lock cache initialized (backend: {}, ttl: {}s)",
        cache.backend_name(),
        config.lock_ttl_seconds
    );
    Ok(cache)
}

pub fn build_post_service(
    db: Database,
    cache: Arc<dyn LockCache>,
    lock_ttl: Duration,
) -> PostService {
    let locks = ResourceLockManager::new(cache, LockScope::post(), lock_ttl);
    PostService::new(Arc::new(db) as Arc<dyn PostRepository>, locks)
}

pub async fn build_app_state(db: Database, config: &Config) -> anyhow::Result<AppState> {
    let cache = build_lock_cache(&db, config).await?;
    let post_service = build_post_service(db, cache, config.lock_ttl());
    tracing::info!("Post service initialized");

    Ok(AppState { post_service })
}
