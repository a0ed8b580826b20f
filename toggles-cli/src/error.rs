//! Error types for togglectl.

use serde::Serialize;
use thiserror::Error;
use toggles_config::ConfigError;
use toggles_core::{ErrorKind, ToggleError};
use toggles_seaorm::SeaOrmError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// Settings could not be loaded or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error (input files, output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failed service or store operation
    #[error(transparent)]
    Toggle(#[from] ToggleError),
}

impl CliError {
    /// Classification printed next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Config(_) => "configuration",
            CliError::InvalidArgument(_) => "invalid_argument",
            CliError::Io(_) => "io",
            CliError::Toggle(err) => err.kind().as_str(),
        }
    }

    /// Process exit code.
    ///
    /// | code | meaning                          |
    /// |------|----------------------------------|
    /// | 1    | infrastructure, I/O              |
    /// | 2    | invalid argument, validation     |
    /// | 3    | conflict                         |
    /// | 4    | not found                        |
    /// | 5    | constraint                       |
    /// | 6    | ID generation                    |
    /// | 78   | configuration                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 78,
            CliError::InvalidArgument(_) => 2,
            CliError::Io(_) => 1,
            CliError::Toggle(err) => match err.kind() {
                ErrorKind::Validation => 2,
                ErrorKind::Conflict => 3,
                ErrorKind::NotFound => 4,
                ErrorKind::Constraint => 5,
                ErrorKind::IdGeneration => 6,
                ErrorKind::Infrastructure => 1,
            },
        }
    }

    /// The JSON body printed on stderr.
    pub fn to_json(&self) -> serde_json::Value {
        #[derive(Serialize)]
        struct ErrorResponse<'a> {
            error: String,
            kind: &'a str,
        }

        let message = match self {
            CliError::Toggle(err) => err.message().to_string(),
            other => other.to_string(),
        };
        serde_json::to_value(ErrorResponse {
            error: message,
            kind: self.kind(),
        })
        .unwrap_or_else(|_| serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SeaOrmError> for CliError {
    fn from(e: SeaOrmError) -> Self {
        match e {
            SeaOrmError::Config(msg) => CliError::Config(msg),
            other => CliError::Toggle(other.into()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::InvalidArgument(e.to_string())
    }
}
