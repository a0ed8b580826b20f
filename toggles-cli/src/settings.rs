//! Runtime settings for togglectl.
//!
//! Sources, later ones winning: `--config` file, `--env-file` (or `./.env`),
//! then the process environment. Keys carry the `TOGGLES_` prefix in the
//! environment (`TOGGLES_DATABASE_URL`); the unprefixed `DATABASE_URL` and
//! `DSN` are accepted as fallbacks for the database URL.

use crate::error::{CliError, CliResult};
use std::path::Path;
use std::time::Duration;
use toggles_config::{ConfigManager, ConfigValidator, Validate};
use toggles_seaorm::DatabaseConfig;

pub const ENV_PREFIX: &str = "TOGGLES";

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    /// Zero disables the per-operation deadline
    pub operation_timeout_secs: u64,
}

impl Validate for Settings {
    fn validate(&self) -> toggles_config::Result<()> {
        ConfigValidator::not_empty(&self.database_url, "database_url")?;
        ConfigValidator::has_scheme(&self.database_url, "database_url")?;
        ConfigValidator::in_range(self.max_connections, 1, 1000, "max_connections")?;
        ConfigValidator::in_range(self.operation_timeout_secs, 0, 3600, "operation_timeout_secs")?;
        Ok(())
    }
}

impl Settings {
    /// Load and validate settings.
    pub fn load(config_file: Option<&Path>, env_file: Option<&Path>) -> CliResult<Self> {
        let mut config = ConfigManager::with_prefix(ENV_PREFIX);
        if let Some(path) = config_file {
            config.load_auto(path)?;
        }
        config.load_dotenv(env_file)?;

        let mut plain = ConfigManager::new();
        plain.load_dotenv(env_file)?;

        Self::resolve(&config, &plain)
    }

    /// Build settings from prefixed values, falling back to unprefixed
    /// `database_url` / `dsn` for the URL.
    pub fn resolve(config: &ConfigManager, plain: &ConfigManager) -> CliResult<Self> {
        let database_url = config
            .get_string("database_url")
            .or_else(|_| plain.get_string("database_url"))
            .or_else(|_| plain.get_string("dsn"))
            .map_err(|_| {
                CliError::Config(
                    "database URL not set (TOGGLES_DATABASE_URL, DATABASE_URL or DSN)".into(),
                )
            })?;

        let settings = Self {
            database_url: database_url.trim().to_string(),
            max_connections: config.get_parsed_or("max_connections", DEFAULT_MAX_CONNECTIONS)?,
            operation_timeout_secs: config
                .get_parsed_or("operation_timeout_secs", DEFAULT_OPERATION_TIMEOUT_SECS)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone()).max_connections(self.max_connections)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }
}
