//! Redis lock cache for multi-instance deployments.
//!
//! Keys are stored as-is with a millisecond `PX` expiry. Atomic claims
//! and owner-checked releases run as Lua scripts so the check and the
//! write happen in one server step.

use crate::domain::ports::lock_cache::{CacheError, CacheResult, LockCache};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

const CLAIM_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current and current ~= ARGV[1] then
    return current
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
return false
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

pub const DEFAULT_REDIS_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct RedisLockCache {
    conn: ConnectionManager,
    claim_script: Script,
    release_script: Script,
    op_timeout: Duration,
}

impl RedisLockCache {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str, op_timeout: Duration) -> CacheResult<Self> {
        tracing::info!("Initializing Redis lock cache");

        let client = Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {}", e)))?;

        let conn = match timeout(op_timeout, ConnectionManager::new(client)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(CacheError::Unavailable(format!(
                    "failed to connect to redis: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(CacheError::Unavailable(format!(
                    "redis connection timed out after {:?}",
                    op_timeout
                )))
            }
        };

        let cache = Self {
            conn,
            claim_script: Script::new(CLAIM_SCRIPT),
            release_script: Script::new(RELEASE_SCRIPT),
            op_timeout,
        };

        let mut conn = cache.conn.clone();
        let ping = redis::cmd("PING");
        let pong: String = cache.run("ping", ping.query_async(&mut conn)).await?;
        if pong != "PONG" {
            return Err(CacheError::Unavailable(format!(
                "unexpected redis ping reply: {}",
                pong
            )));
        }

        tracing::info!("Redis lock cache connection established");
        Ok(cache)
    }

    async fn run<T, F>(&self, operation: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!("Redis {} failed: {}", operation, e);
                Err(CacheError::Unavailable(format!(
                    "redis {} failed: {}",
                    operation, e
                )))
            }
            Err(_) => Err(CacheError::Unavailable(format!(
                "redis {} timed out after {:?}",
                operation, self.op_timeout
            ))),
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LockCache for RedisLockCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: Option<String> = self.run("GET", cmd.query_async(&mut conn)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(ttl_millis(ttl));
        let _: () = self.run("SET", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _: () = self.run("DEL", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, String>> {
        // MGET rejects an empty key list
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        let values: Vec<Option<String>> = self.run("MGET", cmd.query_async(&mut conn)).await?;

        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key.clone(), value)))
            .collect())
    }

    async fn claim(&self, key: &str, holder: &str, ttl: Duration) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let mut invocation = self.claim_script.key(key);
        invocation.arg(holder).arg(ttl_millis(ttl));
        let current: Option<String> = self
            .run("claim", invocation.invoke_async(&mut conn))
            .await?;
        Ok(current)
    }

    async fn release(&self, key: &str, holder: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.release_script.key(key);
        invocation.arg(holder);
        let removed: i64 = self
            .run("release", invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
