use crate::domain::ports::clock::{Clock, SystemClock};
use crate::domain::ports::lock_cache::{CacheError, CacheResult, LockCache};
use crate::domain::services::MAX_LOCK_TTL;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CLAIM_ATTEMPTS: usize = 3;

/// Lock cache stored in the `lock_entries` table of the application database.
///
/// Timestamps are fixed-width RFC 3339 UTC strings so that expiry checks can
/// be done with plain string comparison in SQL.
#[derive(Clone)]
pub struct DatabaseLockCache {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl DatabaseLockCache {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn now_and_expiry(&self, ttl: Duration) -> (String, String) {
        // Expiries must stay within four-digit years to keep string order.
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl.min(MAX_LOCK_TTL))
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_LOCK_TTL.as_secs() as i64));
        let expires_at = now + ttl;
        (Self::timestamp(now), Self::timestamp(expires_at))
    }

    /// Delete rows whose TTL has passed. Returns how many were removed.
    pub async fn purge_expired(&self) -> CacheResult<u64> {
        let now = Self::timestamp(self.clock.now());
        let result = sqlx::query("DELETE FROM lock_entries WHERE expires_at <= ?")
            .bind(now)
            .execute(self.db.pool())
            .await
            .map_err(|e| unavailable("purge", e))?;
        Ok(result.rows_affected())
    }
}

fn unavailable(operation: &str, err: sqlx::Error) -> CacheError {
    CacheError::Unavailable(format!("lock entry {} failed: {}", operation, err))
}

#[async_trait]
impl LockCache for DatabaseLockCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Self::timestamp(self.clock.now());
        let row = sqlx::query("SELECT holder FROM lock_entries WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(now)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| unavailable("read", e))?;

        match row {
            Some(row) => Ok(Some(
                row.try_get("holder").map_err(|e| unavailable("read", e))?,
            )),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let (_, expires_at) = self.now_and_expiry(ttl);
        sqlx::query(
            r#"
            INSERT INTO lock_entries (key, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| unavailable("write", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        sqlx::query("DELETE FROM lock_entries WHERE key = ?")
            .bind(key)
            .execute(self.db.pool())
            .await
            .map_err(|e| unavailable("delete", e))?;
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> CacheResult<HashMap<String, String>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let query_str = format!(
            "SELECT key, holder FROM lock_entries WHERE key IN ({}) AND expires_at > ?",
            placeholders
        );

        let mut query = sqlx::query(&query_str);
        for key in keys {
            query = query.bind(key);
        }
        let rows = query
            .bind(Self::timestamp(self.clock.now()))
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| unavailable("bulk read", e))?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key").map_err(|e| unavailable("bulk read", e))?;
            let holder: String = row
                .try_get("holder")
                .map_err(|e| unavailable("bulk read", e))?;
            found.insert(key, holder);
        }
        Ok(found)
    }

    async fn claim(&self, key: &str, holder: &str, ttl: Duration) -> CacheResult<Option<String>> {
        // Insert, or take over the row only when it has expired or is
        // already ours. Zero rows affected means a live foreign holder.
        let query = r#"
            INSERT INTO lock_entries (key, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE lock_entries.expires_at <= ? OR lock_entries.holder = excluded.holder
        "#;

        for _ in 0..CLAIM_ATTEMPTS {
            let (now, expires_at) = self.now_and_expiry(ttl);
            let result = sqlx::query(query)
                .bind(key)
                .bind(holder)
                .bind(expires_at)
                .bind(now)
                .execute(self.db.pool())
                .await
                .map_err(|e| unavailable("claim", e))?;

            if result.rows_affected() > 0 {
                return Ok(None);
            }

            // The row may expire, be released or change hands between the
            // two statements; in that case try again.
            match self.get(key).await? {
                Some(current) if current != holder => return Ok(Some(current)),
                _ => continue,
            }
        }

        Err(CacheError::Unavailable(format!(
            "lock entry {} kept changing during claim",
            key
        )))
    }

    async fn release(&self, key: &str, holder: &str) -> CacheResult<bool> {
        let now = Self::timestamp(self.clock.now());
        let result =
            sqlx::query("DELETE FROM lock_entries WHERE key = ? AND holder = ? AND expires_at > ?")
                .bind(key)
                .bind(holder)
                .bind(now)
                .execute(self.db.pool())
                .await
                .map_err(|e| unavailable("release", e))?;
        Ok(result.rows_affected() > 0)
    }

    fn backend_name(&self) -> &'static str {
        "database"
    }
}
