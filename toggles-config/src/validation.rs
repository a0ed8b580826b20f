// Configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Implemented by settings structs that check themselves after loading
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable field checks
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not blank
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within an inclusive range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + Display>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            let allowed = allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of [{}], got {}",
                field, allowed, value
            )));
        }
        Ok(())
    }

    /// Validate that a connection string names a scheme (`scheme:rest`)
    pub fn has_scheme(value: &str, field: &str) -> Result<()> {
        let valid = value
            .split_once(':')
            .is_some_and(|(scheme, rest)| {
                !scheme.is_empty()
                    && !rest.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
            });

        if !valid {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a connection URL such as postgres://... or sqlite:...",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("value", "field").is_ok());
        assert!(ConfigValidator::not_empty("", "field").is_err());
        assert!(ConfigValidator::not_empty("   ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(5, 1, 10, "field").is_ok());
        assert!(ConfigValidator::in_range(0, 1, 10, "field").is_err());

        let err = ConfigValidator::in_range(11, 1, 10, "max_connections").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: max_connections must be between 1 and 10, got 11"
        );
    }

    #[test]
    fn test_one_of_validation() {
        let allowed = ["pretty", "json"];
        assert!(ConfigValidator::one_of(&"json", &allowed, "format").is_ok());
        assert!(ConfigValidator::one_of(&"xml", &allowed, "format").is_err());
    }

    #[test]
    fn test_scheme_validation() {
        assert!(ConfigValidator::has_scheme("postgres://localhost/toggles", "url").is_ok());
        assert!(ConfigValidator::has_scheme("sqlite::memory:", "url").is_ok());
        assert!(ConfigValidator::has_scheme("localhost", "url").is_err());
        assert!(ConfigValidator::has_scheme(":memory", "url").is_err());
    }
}
