//! Feature evaluation for a requesting customer.

use crate::error::{ResultExt, ToggleError, ToggleResult};
use crate::model::{CustomerFeature, normalize_timestamp};
use crate::service::{log_failure, with_deadline};
use crate::source::{Clock, SystemClock};
use crate::store::FeatureStore;
use std::sync::Arc;
use std::time::Duration;
use toggles_log::debug;

/// Answers which of the requested features are active for a customer.
///
/// A feature is active when the customer holds an entitlement and the
/// feature is not inverted. Expiry is reported separately and does not
/// change `active`.
#[derive(Clone)]
pub struct EvaluationService {
    store: Arc<dyn FeatureStore>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl EvaluationService {
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            timeout: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluate `technical_names` for `customer_id` at the current time.
    ///
    /// Unknown names are left out of the result.
    pub async fn evaluate(
        &self,
        customer_id: &str,
        technical_names: &[String],
    ) -> ToggleResult<Vec<CustomerFeature>> {
        with_deadline(self.timeout, self.snapshot(customer_id, technical_names))
            .await
            .inspect_err(|e| log_failure("evaluate features", e))
    }

    async fn snapshot(
        &self,
        customer_id: &str,
        technical_names: &[String],
    ) -> ToggleResult<Vec<CustomerFeature>> {
        if technical_names.is_empty() {
            return Err(ToggleError::validation("no feature technical names given"));
        }

        let as_of = normalize_timestamp(self.clock.now());
        let rows = self
            .store
            .find_entitlement_snapshot(customer_id, as_of, technical_names)
            .await
            .context("find customer features by technical names")?;

        debug!(
            target: "toggles::evaluation",
            requested = technical_names.len(),
            found = rows.len();
            "Evaluated features"
        );
        Ok(rows.into_iter().map(CustomerFeature::from).collect())
    }
}
