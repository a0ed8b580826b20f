//! Feature mutations: create, update, archive and customer management.

use crate::entitlement::{EntitlementDiff, dedup_customer_ids};
use crate::error::{ErrorKind, ResultExt, ToggleError, ToggleResult};
use crate::model::{
    ArchivedFeature, Entitlement, Feature, FeatureDraft, FeatureUpdate, normalize_timestamp,
};
use crate::source::{Clock, IdGenerator, RandomIds, SystemClock};
use crate::store::{FeatureStore, TransactionOptions};
use crate::validation::FeatureValidator;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use toggles_log::{debug, info, warn};
use uuid::Uuid;

/// Run `operation`, giving up after `timeout`.
///
/// Giving up drops the operation's future and with it any open transaction.
pub(crate) async fn with_deadline<T>(
    timeout: Option<Duration>,
    operation: impl Future<Output = ToggleResult<T>>,
) -> ToggleResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| ToggleError::infrastructure("operation timed out"))?,
        None => operation.await,
    }
}

pub(crate) fn log_failure(operation: &str, err: &ToggleError) {
    match err.kind() {
        ErrorKind::Infrastructure | ErrorKind::IdGeneration => {
            warn!(target: "toggles::service", kind = err.kind(); "{} failed: {}", operation, err)
        }
        _ => debug!(target: "toggles::service", kind = err.kind(); "{} rejected: {}", operation, err),
    }
}

/// Timestamp for a row replacing the revision stamped `expected`.
///
/// Always later than `expected`, so a token is never accepted twice even when
/// updates share a millisecond or the clock steps back.
pub(crate) fn next_revision(now: DateTime<Utc>, expected: DateTime<Utc>) -> DateTime<Utc> {
    normalize_timestamp(now).max(expected + chrono::Duration::milliseconds(1))
}

/// Owns the transactional lifecycle of features and their entitlements.
///
/// ```
/// use std::sync::Arc;
/// use toggles_core::{FeatureDraft, FeatureService, MemoryFeatureStore};
///
/// # tokio_test::block_on(async {
/// let service = FeatureService::new(Arc::new(MemoryFeatureStore::new()));
/// let feature = service
///     .create_feature(FeatureDraft::new("new-checkout").with_customers(["1234"]))
///     .await
///     .unwrap();
/// assert_eq!(feature.created_at, feature.updated_at);
/// # });
/// ```
#[derive(Clone)]
pub struct FeatureService {
    store: Arc<dyn FeatureStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    validator: FeatureValidator,
    timeout: Option<Duration>,
}

impl FeatureService {
    /// Service with the wall clock, random v4 ids and the standard rules.
    pub fn new(store: Arc<dyn FeatureStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
            validator: FeatureValidator::default(),
            timeout: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_validator(mut self, validator: FeatureValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Abandon any operation running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create a feature with its initial customers.
    ///
    /// All identifiers are generated before anything is written; the feature
    /// row and its entitlements are saved in one transaction.
    pub async fn create_feature(&self, draft: FeatureDraft) -> ToggleResult<Feature> {
        with_deadline(self.timeout, self.create(draft))
            .await
            .inspect_err(|e| log_failure("create feature", e))
    }

    async fn create(&self, draft: FeatureDraft) -> ToggleResult<Feature> {
        self.validator.validate(&draft).context("validate feature")?;

        let FeatureDraft {
            display_name,
            technical_name,
            expires_on,
            description,
            inverted,
            customer_ids,
        } = draft;
        let customer_ids = dedup_customer_ids(customer_ids);

        let id = self.ids.generate().context("generate feature id")?;
        let entitlements = self
            .entitlements_for(id, customer_ids.iter().cloned())
            .context("generate customer feature join table id")?;

        let now = normalize_timestamp(self.clock.now());
        let feature = Feature {
            id,
            display_name,
            technical_name,
            expires_on: expires_on.map(normalize_timestamp),
            description,
            inverted,
            created_at: now,
            updated_at: now,
            customer_ids,
        };

        let tx = self
            .store
            .begin(TransactionOptions::default())
            .await
            .context("begin transaction")?;
        tx.save_feature(&feature).await.context("save feature")?;
        tx.save_entitlements(&entitlements)
            .await
            .context("save customers")?;
        tx.commit().await.context("commit transaction")?;

        info!(
            target: "toggles::service",
            feature_id = feature.id,
            technical_name = feature.technical_name,
            customers = entitlements.len();
            "Created feature"
        );
        Ok(feature)
    }

    /// Replace a feature's state and customer list.
    ///
    /// `last_updated_at` is the `updated_at` the caller last observed. If the
    /// stored row carries another value, or no longer exists, the update fails
    /// with `NotFound` and nothing changes. Returns the stored feature with its
    /// customers, read inside the same transaction.
    pub async fn update_feature(
        &self,
        id: Uuid,
        last_updated_at: DateTime<Utc>,
        draft: FeatureDraft,
    ) -> ToggleResult<Feature> {
        with_deadline(self.timeout, self.update(id, last_updated_at, draft))
            .await
            .inspect_err(|e| log_failure("update feature", e))
    }

    async fn update(
        &self,
        id: Uuid,
        last_updated_at: DateTime<Utc>,
        draft: FeatureDraft,
    ) -> ToggleResult<Feature> {
        self.validator.validate(&draft).context("validate feature")?;

        let tx = self
            .store
            .begin(TransactionOptions::read_committed())
            .await
            .context("begin transaction")?;

        let expected = normalize_timestamp(last_updated_at);
        let stamp = next_revision(self.clock.now(), expected);
        let update = FeatureUpdate::from_draft(id, &draft, stamp);
        tx.update_feature(&update, expected)
            .await
            .context("update feature")?;

        let current = tx
            .find_customer_ids_by_feature_id(id)
            .await
            .context("find customer ids by feature id")?;
        let diff = EntitlementDiff::between(&draft.customer_ids, &current);

        let added = self
            .entitlements_for(id, diff.to_add.iter().cloned())
            .context("generate customer feature join table id")?;
        tx.save_entitlements(&added)
            .await
            .context("save new customers")?;

        let removed: Vec<String> = diff.to_remove.into_iter().collect();
        tx.delete_entitlements_by_customer_ids(id, &removed)
            .await
            .context("delete removed customers")?;

        let feature = tx
            .find_feature_with_entitlements(id)
            .await
            .context("find updated feature")?;
        tx.commit().await.context("commit transaction")?;

        info!(
            target: "toggles::service",
            feature_id = id,
            technical_name = feature.technical_name,
            added = added.len(),
            removed = removed.len();
            "Updated feature"
        );
        Ok(feature)
    }

    /// Move a feature to the archive, dropping its entitlements.
    ///
    /// The archived record is stamped with the archival moment as both its
    /// creation and update time.
    pub async fn archive_feature(&self, id: Uuid) -> ToggleResult<ArchivedFeature> {
        with_deadline(self.timeout, self.archive(id))
            .await
            .inspect_err(|e| log_failure("archive feature", e))
    }

    async fn archive(&self, id: Uuid) -> ToggleResult<ArchivedFeature> {
        let tx = self
            .store
            .begin(TransactionOptions::read_committed())
            .await
            .context("begin transaction")?;

        let feature = tx.find_feature(id).await.context("find feature")?;
        let archived = ArchivedFeature::from_feature(feature, self.clock.now());

        tx.save_archived_feature(&archived)
            .await
            .context("save archived feature")?;
        tx.delete_feature(id).await.context("delete feature")?;
        tx.commit().await.context("commit transaction")?;

        info!(
            target: "toggles::service",
            feature_id = id,
            technical_name = archived.technical_name;
            "Archived feature"
        );
        Ok(archived)
    }

    /// Entitle more customers to a feature without touching the feature itself.
    ///
    /// Already entitled customers fail the whole batch with `Conflict`; an
    /// unknown feature fails it with `Constraint`.
    pub async fn add_customers(&self, feature_id: Uuid, customer_ids: Vec<String>) -> ToggleResult<()> {
        with_deadline(self.timeout, self.add(feature_id, customer_ids))
            .await
            .inspect_err(|e| log_failure("add customers", e))
    }

    async fn add(&self, feature_id: Uuid, customer_ids: Vec<String>) -> ToggleResult<()> {
        if customer_ids.is_empty() {
            return Err(ToggleError::validation("no customer IDs given"));
        }

        let entitlements = self
            .entitlements_for(feature_id, customer_ids)
            .context("generate customer feature id")?;
        self.store
            .save_entitlements(&entitlements)
            .await
            .context("save customers")?;

        info!(
            target: "toggles::service",
            feature_id = feature_id,
            customers = entitlements.len();
            "Added customers to feature"
        );
        Ok(())
    }

    /// All live features, without customer lists.
    pub async fn list_features(&self) -> ToggleResult<Vec<Feature>> {
        with_deadline(self.timeout, async {
            self.store
                .find_all_features()
                .await
                .context("find all features")
        })
        .await
        .inspect_err(|e| log_failure("list features", e))
    }

    /// One feature with its customer list.
    pub async fn get_feature(&self, id: Uuid) -> ToggleResult<Feature> {
        with_deadline(self.timeout, async {
            self.store
                .find_feature_with_entitlements(id)
                .await
                .context("find feature")
        })
        .await
        .inspect_err(|e| log_failure("get feature", e))
    }

    fn entitlements_for(
        &self,
        feature_id: Uuid,
        customer_ids: impl IntoIterator<Item = String>,
    ) -> ToggleResult<Vec<Entitlement>> {
        customer_ids
            .into_iter()
            .map(|customer_id| -> ToggleResult<Entitlement> {
                Ok(Entitlement {
                    id: self.ids.generate()?,
                    feature_id,
                    customer_id,
                })
            })
            .collect()
    }
}
