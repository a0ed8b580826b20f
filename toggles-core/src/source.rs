//! Time and identifier sources injected into the services.

use crate::error::ToggleError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Failure of an identifier source
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IdGenerationError(pub String);

impl From<IdGenerationError> for ToggleError {
    fn from(err: IdGenerationError) -> Self {
        ToggleError::IdGeneration(err.0)
    }
}

/// Source of unique identifiers
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<Uuid, IdGenerationError>;
}

impl<F> IdGenerator for F
where
    F: Fn() -> Result<Uuid, IdGenerationError> + Send + Sync,
{
    fn generate(&self) -> Result<Uuid, IdGenerationError> {
        self()
    }
}

/// Random (v4) UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn generate(&self) -> Result<Uuid, IdGenerationError> {
        Ok(Uuid::new_v4())
    }
}

/// Predictable UUIDs `...0001`, `...0002`, ... for tests
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.saturating_sub(1)),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> Result<Uuid, IdGenerationError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Uuid::from_u128(u128::from(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIds::new();
        assert_eq!(ids.generate().unwrap(), Uuid::from_u128(1));
        assert_eq!(ids.generate().unwrap(), Uuid::from_u128(2));

        let ids = SequentialIds::starting_at(100);
        assert_eq!(ids.generate().unwrap(), Uuid::from_u128(100));
    }

    #[test]
    fn test_fixed_clock() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), start + Duration::days(1));
    }

    #[test]
    fn test_closures_are_sources() {
        let failing = || -> Result<Uuid, IdGenerationError> {
            Err(IdGenerationError("entropy exhausted".into()))
        };
        let err: ToggleError = failing.generate().unwrap_err().into();
        assert_eq!(err, ToggleError::IdGeneration("entropy exhausted".into()));

        let epoch = || Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(epoch.now().timestamp(), 0);
    }
}
