//! Configuration for database connections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a SeaORM database connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Idle timeout for connections.
    #[serde(default = "default_idle_timeout")]
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    #[serde(default = "default_max_lifetime")]
    #[serde(with = "duration_secs")]
    pub max_lifetime: Duration,

    /// Enable SQLx statement logging.
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_max_lifetime() -> Duration {
    Duration::from_secs(30 * 60)
}

impl DatabaseConfig {
    /// Create a new configuration with the given database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout: default_connect_timeout(),
            idle_timeout: default_idle_timeout(),
            max_lifetime: default_max_lifetime(),
            sqlx_logging: false,
        }
    }

    /// A private in-memory SQLite database.
    ///
    /// The pool is pinned to one connection, since every SQLite memory
    /// connection is a separate database.
    pub fn sqlite_memory() -> Self {
        Self::new("sqlite::memory:")
            .max_connections(1)
            .min_connections(1)
    }

    /// Create configuration from environment variables.
    ///
    /// - `DATABASE_URL`, or `DSN` when unset: required database URL
    /// - `DATABASE_MAX_CONNECTIONS`: max connections (default: 10)
    /// - `DATABASE_MIN_CONNECTIONS`: min connections (default: 1)
    /// - `DATABASE_CONNECT_TIMEOUT`: connect timeout in seconds
    /// - `DATABASE_IDLE_TIMEOUT`: idle timeout in seconds
    /// - `DATABASE_SQLX_LOGGING`: enable SQLx logging (true/false)
    pub fn from_env() -> Result<Self, crate::SeaOrmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, crate::SeaOrmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("DSN"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| crate::SeaOrmError::Config("DATABASE_URL not set".into()))?;

        let mut config = Self::new(database_url);

        let parse = |key: &str| -> Result<Option<u64>, crate::SeaOrmError> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| crate::SeaOrmError::Config(format!("Invalid {}", key)))
                })
                .transpose()
        };

        if let Some(max) = parse("DATABASE_MAX_CONNECTIONS")? {
            config.max_connections = u32::try_from(max).map_err(|_| {
                crate::SeaOrmError::Config("Invalid DATABASE_MAX_CONNECTIONS".into())
            })?;
        }

        if let Some(min) = parse("DATABASE_MIN_CONNECTIONS")? {
            config.min_connections = u32::try_from(min).map_err(|_| {
                crate::SeaOrmError::Config("Invalid DATABASE_MIN_CONNECTIONS".into())
            })?;
        }

        if let Some(secs) = parse("DATABASE_CONNECT_TIMEOUT")? {
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse("DATABASE_IDLE_TIMEOUT")? {
            config.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(logging) = lookup("DATABASE_SQLX_LOGGING") {
            config.sqlx_logging = logging == "true" || logging == "1";
        }

        Ok(config)
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Enable or disable SQLx logging.
    pub fn sqlx_logging(mut self, enabled: bool) -> Self {
        self.sqlx_logging = enabled;
        self
    }

    /// The URL with credentials removed, for logging.
    pub fn redacted_url(&self) -> String {
        let url = &self.database_url;
        match (url.find("://"), url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &url[..scheme_end], &url[at..])
            }
            _ => url.clone(),
        }
    }

    /// Convert to SeaORM ConnectOptions.
    pub fn to_connect_options(&self) -> sea_orm::ConnectOptions {
        let mut options = sea_orm::ConnectOptions::new(&self.database_url);

        options
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            .sqlx_logging(self.sqlx_logging);

        options
    }
}

/// Durations as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_dsn_fallback() {
        let config = DatabaseConfig::from_lookup(lookup(&[("DSN", "sqlite:toggles.db")])).unwrap();
        assert_eq!(config.database_url, "sqlite:toggles.db");

        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DSN", "sqlite:toggles.db"),
            ("DATABASE_URL", "postgres://localhost/toggles"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgres://localhost/toggles");
    }

    #[test]
    fn test_missing_url() {
        let err = DatabaseConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, crate::SeaOrmError::Config(_)));
    }

    #[test]
    fn test_pool_settings() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/toggles"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("DATABASE_CONNECT_TIMEOUT", "3"),
            ("DATABASE_SQLX_LOGGING", "1"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(config.sqlx_logging);

        let err = DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/toggles"),
            ("DATABASE_MAX_CONNECTIONS", "lots"),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Invalid DATABASE_MAX_CONNECTIONS");
    }

    #[test]
    fn test_redacted_url() {
        let config = DatabaseConfig::new("postgres://admin:secret@db:5432/toggles");
        assert_eq!(config.redacted_url(), "postgres://***@db:5432/toggles");
        assert_eq!(
            DatabaseConfig::sqlite_memory().redacted_url(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: DatabaseConfig =
            serde_json::from_str(r#"{"database_url": "sqlite::memory:", "connect_timeout": 5}"#)
                .unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.max_connections, 10);
    }
}
