//! Error types for the SeaORM store.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use toggles_core::ToggleError;

/// Errors raised outside of store operations: connecting, configuring and
/// bootstrapping the schema.
#[derive(Error, Debug)]
pub enum SeaOrmError {
    /// Database connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database error from SeaORM.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema bootstrap error.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Result type alias for SeaORM operations.
pub type SeaOrmResult<T> = Result<T, SeaOrmError>;

/// Classify a database error for the services.
///
/// Unique violations become `Conflict`, foreign key violations `Constraint`
/// and missing records `NotFound`; everything else is `Infrastructure`.
pub fn classify(err: DbErr) -> ToggleError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => ToggleError::Conflict(message),
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => ToggleError::Constraint(message),
        _ => match err {
            DbErr::RecordNotFound(message) => ToggleError::NotFound(message),
            other => ToggleError::Infrastructure(other.to_string()),
        },
    }
}

impl From<SeaOrmError> for ToggleError {
    fn from(err: SeaOrmError) -> Self {
        match err {
            SeaOrmError::Database(db) => classify(db),
            other => ToggleError::Infrastructure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toggles_core::ErrorKind;

    #[test]
    fn test_unclassified_errors_are_infrastructure() {
        let err = classify(DbErr::Custom("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.message().contains("disk full"));
    }

    #[test]
    fn test_record_not_found() {
        let err = classify(DbErr::RecordNotFound("features".into()));
        assert_eq!(err, ToggleError::NotFound("features".into()));
    }

    #[test]
    fn test_config_error_converts() {
        let err: ToggleError = SeaOrmError::Config("DATABASE_URL not set".into()).into();
        assert_eq!(
            err,
            ToggleError::Infrastructure("Configuration error: DATABASE_URL not set".into())
        );
    }
}
