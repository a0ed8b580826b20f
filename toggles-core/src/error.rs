//! Error classification shared by the services and every store.

use std::fmt;
use thiserror::Error;

/// Error returned by feature toggle operations.
///
/// The variant is the classification callers map to their own status
/// vocabulary; the message is free text, prefixed with the steps that were
/// being attempted (`"update feature: feature ... does not exist"`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    /// Caller input violates a rule.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// The target row is absent, or the optimistic concurrency token was stale.
    #[error("{0}")]
    NotFound(String),

    /// A referential rule was violated.
    #[error("{0}")]
    Constraint(String),

    /// The identifier source failed.
    #[error("{0}")]
    IdGeneration(String),

    /// Store unreachable, driver failure or anything unclassified.
    #[error("{0}")]
    Infrastructure(String),
}

/// Classification of a [`ToggleError`] without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Constraint,
    IdGeneration,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Constraint => "constraint",
            Self::IdGeneration => "id_generation",
            Self::Infrastructure => "infrastructure",
        }
    }

    /// HTTP status a transport should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Conflict => 409,
            Self::NotFound => 404,
            Self::Constraint => 422,
            Self::IdGeneration | Self::Infrastructure => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToggleError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Constraint(_) => ErrorKind::Constraint,
            Self::IdGeneration(_) => ErrorKind::IdGeneration,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m)
            | Self::Conflict(m)
            | Self::NotFound(m)
            | Self::Constraint(m)
            | Self::IdGeneration(m)
            | Self::Infrastructure(m) => m,
        }
    }

    fn message_mut(&mut self) -> &mut String {
        match self {
            Self::Validation(m)
            | Self::Conflict(m)
            | Self::NotFound(m)
            | Self::Constraint(m)
            | Self::IdGeneration(m)
            | Self::Infrastructure(m) => m,
        }
    }

    /// Prefix the message with the step being attempted. The kind is kept.
    pub fn context(mut self, step: impl fmt::Display) -> Self {
        let message = self.message_mut();
        *message = format!("{}: {}", step, message);
        self
    }

    /// The feature-does-not-exist error used by lookups and the optimistic
    /// update alike.
    pub fn feature_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound(format!("feature {} does not exist", id))
    }
}

pub type ToggleResult<T> = Result<T, ToggleError>;

/// Adds [`ToggleError::context`] to results.
pub trait ResultExt<T> {
    fn context(self, step: impl fmt::Display) -> ToggleResult<T>;
}

impl<T, E: Into<ToggleError>> ResultExt<T> for Result<T, E> {
    fn context(self, step: impl fmt::Display) -> ToggleResult<T> {
        self.map_err(|e| e.into().context(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind() {
        let err = ToggleError::feature_not_found("42")
            .context("update feature")
            .context("handle request");

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "handle request: update feature: feature 42 does not exist"
        );
    }

    #[test]
    fn test_result_context() {
        let result: ToggleResult<()> = Err(ToggleError::conflict("duplicate"));
        let err = result.context("save feature").unwrap_err();
        assert_eq!(err, ToggleError::Conflict("save feature: duplicate".into()));
    }

    #[test]
    fn test_http_status_mapping() {
        let statuses: Vec<(ErrorKind, u16)> = [
            ToggleError::validation(""),
            ToggleError::conflict(""),
            ToggleError::not_found(""),
            ToggleError::constraint(""),
            ToggleError::IdGeneration(String::new()),
            ToggleError::infrastructure(""),
        ]
        .iter()
        .map(|e| (e.kind(), e.kind().http_status()))
        .collect();

        assert_eq!(
            statuses,
            vec![
                (ErrorKind::Validation, 400),
                (ErrorKind::Conflict, 409),
                (ErrorKind::NotFound, 404),
                (ErrorKind::Constraint, 422),
                (ErrorKind::IdGeneration, 500),
                (ErrorKind::Infrastructure, 500),
            ]
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(ErrorKind::IdGeneration.as_str(), "id_generation");
    }
}
