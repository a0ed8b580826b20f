//! CLI command implementations.
//!
//! Commands return the JSON document to print; `main` owns the output.

pub mod evaluate;
pub mod features;
pub mod migrate;

use crate::error::{CliError, CliResult};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use toggles_core::{EvaluationService, FeatureService, FeatureStore, ToggleError};
use toggles_seaorm::Database;

/// Services wired to one store.
pub struct App {
    pub features: FeatureService,
    pub evaluation: EvaluationService,
}

impl App {
    pub fn new(store: Arc<dyn FeatureStore>, timeout: Option<Duration>) -> Self {
        let mut features = FeatureService::new(store.clone());
        let mut evaluation = EvaluationService::new(store);
        if let Some(timeout) = timeout {
            features = features.with_timeout(timeout);
            evaluation = evaluation.with_timeout(timeout);
        }
        Self {
            features,
            evaluation,
        }
    }

    /// Connect to the configured database.
    pub async fn connect(settings: &Settings) -> CliResult<Self> {
        let db = Database::connect(settings.database_config()).await?;
        Ok(Self::new(
            Arc::new(db.feature_store()),
            settings.operation_timeout(),
        ))
    }
}

/// Parse a timestamp given as Unix milliseconds or RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("timestamp out of range: {}", millis));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected Unix milliseconds or RFC 3339, got '{}': {}", value, e))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> CliResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| CliError::Toggle(ToggleError::infrastructure(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(parse_timestamp("1714564800000").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01T14:00:00+02:00").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
