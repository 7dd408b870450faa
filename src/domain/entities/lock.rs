use crate::domain::entities::identity::{PrincipalId, ResourceId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

const KEY_PREFIX: &str = "lock_";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lock scope must be non-empty lowercase ASCII letters, got {0:?}")]
pub struct InvalidScope(pub String);

/// The resource type a lock manager is bound to.
///
/// Restricted to `[a-z]+` so that the first `_` after the `lock_` prefix
/// always terminates the scope; keys from different scopes can never
/// collide whatever the resource id contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockScope(String);

impl LockScope {
    pub fn new(name: &str) -> Result<Self, InvalidScope> {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(InvalidScope(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn post() -> Self {
        Self("post".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key_for(&self, resource_id: &ResourceId) -> LockKey {
        LockKey(format!("{}{}_{}", KEY_PREFIX, self.0, resource_id.as_str()))
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache key under which the holder of a resource's lock is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of trying to begin exclusive access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    Granted,
    Denied { holder: PrincipalId },
}

impl LockOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted)
    }
}

/// Result of a commit: either the action ran (and the lock was released),
/// or another principal holds the lock and the action was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome<T> {
    Committed(T),
    Denied { holder: PrincipalId },
}

impl<T> CommitOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}
