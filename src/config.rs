use crate::domain::services::MAX_LOCK_TTL;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockBackend {
    Memory,
    Database,
    Redis,
}

impl FromStr for LockBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(LockBackend::Memory),
            "database" | "db" => Ok(LockBackend::Database),
            "redis" => Ok(LockBackend::Redis),
            other => Err(ConfigError::InvalidLockBackend(other.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub lock_ttl_seconds: u64,
    pub lock_backend: LockBackend,
    pub redis_url: Option<String>,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://postlock.db?mode=rwc".to_string());

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let server_port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let lock_ttl_seconds = match lookup("LOCK_TTL_SECONDS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 && secs <= MAX_LOCK_TTL.as_secs() => secs,
                _ => return Err(ConfigError::InvalidLockTtl(raw)),
            },
            None => 300,
        };

        let lock_backend = lookup("LOCK_BACKEND")
            .map(|raw| raw.parse())
            .transpose()?
            .unwrap_or(LockBackend::Memory);

        let redis_url = lookup("REDIS_URL");
        if lock_backend == LockBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingRedisUrl);
        }

        let otel_exporter_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT");

        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| "postlock".to_string());

        let metrics_port = lookup("METRICS_PORT")
            .unwrap_or_else(|| "9000".to_string())
            .parse()
            .unwrap_or(9000);

        Ok(Config {
            database_url,
            server_host,
            server_port,
            lock_ttl_seconds,
            lock_backend,
            redis_url,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("LOCK_TTL_SECONDS must be between 1 and 604800, got {0:?}")]
    InvalidLockTtl(String),

    #[error("LOCK_BACKEND must be one of memory, database, redis; got {0:?}")]
    InvalidLockBackend(String),

    #[error("REDIS_URL environment variable not set (required by LOCK_BACKEND=redis)")]
    MissingRedisUrl,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(config_from(&[]));
        assert_eq!(config.lock_ttl(), Duration::from_secs(300));
        assert_eq!(config.lock_backend, LockBackend::Memory);
        assert_eq!(config.server_address(), "127.0.0.1:3000");
        assert_eq!(config.service_name, "postlock");
    }

    #[test]
    fn test_lock_ttl_override() {
        let config = assert_ok!(config_from(&[("LOCK_TTL_SECONDS", "45")]));
        assert_eq!(config.lock_ttl(), Duration::from_secs(45));

        let config = assert_ok!(config_from(&[("LOCK_TTL_SECONDS", "604800")]));
        assert_eq!(config.lock_ttl(), MAX_LOCK_TTL);
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let err = assert_err!(config_from(&[("LOCK_TTL_SECONDS", "604801")]));
        assert!(matches!(err, ConfigError::InvalidLockTtl(_)));
        assert_err!(config_from(&[("LOCK_TTL_SECONDS", "18446744073709551615")]));
    }

    #[test]
    fn test_zero_or_garbage_ttl_rejected() {
        assert!(matches!(
            config_from(&[("LOCK_TTL_SECONDS", "0")]),
            Err(ConfigError::InvalidLockTtl(_))
        ));
        assert!(matches!(
            config_from(&[("LOCK_TTL_SECONDS", "five")]),
            Err(ConfigError::InvalidLockTtl(_))
        ));
    }

    #[test]
    fn test_backend_parsing() {
        let config = config_from(&[("LOCK_BACKEND", "Database")]).unwrap();
        assert_eq!(config.lock_backend, LockBackend::Database);
        assert!(matches!(
            config_from(&[("LOCK_BACKEND", "memcached")]),
            Err(ConfigError::InvalidLockBackend(_))
        ));
    }

    #[test]
    fn test_redis_backend_requires_url() {
        assert!(matches!(
            config_from(&[("LOCK_BACKEND", "redis")]),
            Err(ConfigError::MissingRedisUrl)
        ));
        let config = config_from(&[
            ("LOCK_BACKEND", "redis"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
        ])
        .unwrap();
        assert_eq!(config.lock_backend, LockBackend::Redis);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            config_from(&[("SERVER_PORT", "99999")]),
            Err(ConfigError::InvalidPort)
        ));
    }
}
