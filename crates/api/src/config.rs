//! Application configuration loaded from environment variables.

use std::time::Duration;

use queue::{Backoff, QueueConfig, Retention};

/// Server and worker configuration with the documented defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string (default: `None`, uses in-memory stores)
/// - `DB_MAX_CONNECTIONS` — max database pool connections (default: `10`)
/// - `QUEUE_NAME` — order queue name (default: `"orders"`)
/// - `WORKER_POOL_SIZE` — worker count (default: number of CPU cores)
/// - `MAX_ATTEMPTS` — job attempt cap (default: `5`)
/// - `BACKOFF_BASE_MS` — exponential backoff base (default: `2000`)
/// - `RETENTION_COMPLETED` / `RETENTION_FAILED` — terminal job retention (defaults: `500` / `10`)
/// - `STALL_TIMEOUT_MS` — active job stall timeout (default: `30000`)
/// - `HANDLER_TIMEOUT_MS` — handler soft timeout (default: `30000`)
/// - `PAYMENT_TIMEOUT_MS` — payment gateway timeout (default: `10000`)
/// - `PAYMENT_FAILURE_PROBABILITY` — dev-only simulated failure rate (default: `0.0`)
/// - `VIP_PRIORITY` — queue priority for VIP submissions (default: `1`)
/// - `SHUTDOWN_GRACE_MS` — graceful shutdown bound (default: `30000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub queue_name: String,
    pub worker_pool_size: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub retention: Retention,
    pub stall_timeout: Duration,
    pub handler_timeout: Duration,
    pub payment_timeout: Duration,
    pub payment_failure_probability: f64,
    pub vip_priority: u32,
    pub shutdown_grace: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_parse(key, default_ms))
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            queue_name: std::env::var("QUEUE_NAME").unwrap_or(defaults.queue_name),
            worker_pool_size: env_parse("WORKER_POOL_SIZE", defaults.worker_pool_size),
            max_attempts: env_parse("MAX_ATTEMPTS", defaults.max_attempts),
            backoff_base: env_millis("BACKOFF_BASE_MS", 2000),
            retention: Retention {
                completed: env_parse("RETENTION_COMPLETED", defaults.retention.completed),
                failed: env_parse("RETENTION_FAILED", defaults.retention.failed),
            },
            stall_timeout: env_millis("STALL_TIMEOUT_MS", 30_000),
            handler_timeout: env_millis("HANDLER_TIMEOUT_MS", 30_000),
            payment_timeout: env_millis("PAYMENT_TIMEOUT_MS", 10_000),
            payment_failure_probability: env_parse("PAYMENT_FAILURE_PROBABILITY", 0.0),
            vip_priority: env_parse("VIP_PRIORITY", defaults.vip_priority),
            shutdown_grace: env_millis("SHUTDOWN_GRACE_MS", 30_000),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the queue configuration slice of this config.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            name: self.queue_name.clone(),
            max_attempts: self.max_attempts,
            backoff: Backoff::exponential(self.backoff_base),
            retention: self.retention,
            stall_timeout: self.stall_timeout,
            handler_timeout: self.handler_timeout,
            ..QueueConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            db_max_connections: 10,
            queue_name: "orders".to_string(),
            worker_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_attempts: 5,
            backoff_base: Duration::from_secs(2),
            retention: Retention::default(),
            stall_timeout: Duration::from_secs(30),
            handler_timeout: Duration::from_secs(30),
            payment_timeout: Duration::from_secs(10),
            payment_failure_probability: 0.0,
            vip_priority: 1,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff_base, Duration::from_secs(2));
        assert_eq!(config.retention.completed, 500);
        assert_eq!(config.retention.failed, 10);
        assert_eq!(config.vip_priority, 1);
        assert_eq!(config.payment_failure_probability, 0.0);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_queue_config_carries_settings() {
        let config = Config {
            queue_name: "priority-orders".to_string(),
            max_attempts: 3,
            ..Config::default()
        };
        let queue_config = config.queue_config();
        assert_eq!(queue_config.name, "priority-orders");
        assert_eq!(queue_config.max_attempts, 3);
        assert_eq!(queue_config.backoff.base, Duration::from_secs(2));
    }
}
