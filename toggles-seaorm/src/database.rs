//! Database connection management.

use crate::{DatabaseConfig, SeaOrmError, SeaOrmFeatureStore, SeaOrmResult};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::sync::Arc;
use toggles_log::{debug, info};

/// Database wrapper providing connection management.
#[derive(Clone)]
pub struct Database {
    conn: DatabaseConnection,
    config: Arc<DatabaseConfig>,
}

impl Database {
    /// Connect to the database with the given configuration.
    pub async fn connect(config: DatabaseConfig) -> SeaOrmResult<Self> {
        info!(url = config.redacted_url(); "Connecting to database");

        let options = config.to_connect_options();
        let conn = sea_orm::Database::connect(options)
            .await
            .map_err(|e| SeaOrmError::Connection(e.to_string()))?;

        info!(
            backend = format!("{:?}", conn.get_database_backend());
            "Database connection established"
        );

        Ok(Self {
            conn,
            config: Arc::new(config),
        })
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Get the configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// A feature store on this connection pool.
    pub fn feature_store(&self) -> SeaOrmFeatureStore {
        SeaOrmFeatureStore::new(self.conn.clone())
    }

    /// Ping the database to check connectivity.
    pub async fn ping(&self) -> SeaOrmResult<()> {
        debug!("Pinging database");
        self.conn
            .ping()
            .await
            .map_err(|e| SeaOrmError::Connection(e.to_string()))
    }

    /// Close the database connection.
    pub async fn close(self) -> SeaOrmResult<()> {
        info!("Closing database connection");
        self.conn
            .close()
            .await
            .map_err(|e| SeaOrmError::Connection(e.to_string()))
    }
}

impl std::ops::Deref for Database {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl AsRef<DatabaseConnection> for Database {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.conn
    }
}
