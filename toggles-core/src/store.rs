//! Persistence contract required by the services.

use crate::error::ToggleResult;
use crate::model::{ArchivedFeature, Entitlement, EntitlementSnapshot, Feature, FeatureUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Whatever the backend uses by default
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Options for [`FeatureStore::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TransactionOptions {
    pub fn read_committed() -> Self {
        Self {
            isolation: IsolationLevel::ReadCommitted,
            read_only: false,
        }
    }
}

/// Feature persistence.
///
/// Every method is a single logical operation. The same contract is served
/// by a plain connection and by an open transaction, so callers compose
/// operations by choosing which handle to call.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Start a transaction.
    ///
    /// Called on a transaction handle, this returns a handle to the same
    /// transaction whose `commit` and `rollback` do nothing; only the handle
    /// that opened the transaction ends it.
    async fn begin(&self, options: TransactionOptions) -> ToggleResult<Box<dyn StoreTransaction>>;

    /// Fails with `NotFound` if absent. `customer_ids` is left empty.
    async fn find_feature(&self, id: Uuid) -> ToggleResult<Feature>;

    /// Like [`find_feature`](Self::find_feature) with `customer_ids` filled in.
    async fn find_feature_with_entitlements(&self, id: Uuid) -> ToggleResult<Feature>;

    /// All live features, ordered by technical name, without customers.
    async fn find_all_features(&self) -> ToggleResult<Vec<Feature>>;

    /// Fails with `Conflict` if the id or technical name is taken.
    async fn save_feature(&self, feature: &Feature) -> ToggleResult<()>;

    /// Write `update` if the stored row still carries `expected_updated_at`.
    ///
    /// A missing row and a stale token are indistinguishable here and both
    /// fail with `NotFound`.
    async fn update_feature(
        &self,
        update: &FeatureUpdate,
        expected_updated_at: DateTime<Utc>,
    ) -> ToggleResult<()>;

    /// Delete a live feature. Its entitlements go with it.
    async fn delete_feature(&self, id: Uuid) -> ToggleResult<()>;

    async fn save_archived_feature(&self, archived: &ArchivedFeature) -> ToggleResult<()>;

    /// Insert entitlements in one batch. An empty batch is a no-op.
    ///
    /// Fails with `Conflict` on a duplicate (feature, customer) pair and with
    /// `Constraint` when the feature does not exist.
    async fn save_entitlements(&self, entitlements: &[Entitlement]) -> ToggleResult<()>;

    /// Remove the given customers from one feature. Empty input is a no-op.
    async fn delete_entitlements_by_customer_ids(
        &self,
        feature_id: Uuid,
        customer_ids: &[String],
    ) -> ToggleResult<()>;

    async fn find_customer_ids_by_feature_id(&self, feature_id: Uuid) -> ToggleResult<Vec<String>>;

    /// For each live feature named in `technical_names`, its inversion flag,
    /// whether it expired before `as_of` and whether `customer_id` is
    /// entitled to it. Unknown names are left out. Rows are ordered by
    /// technical name.
    async fn find_entitlement_snapshot(
        &self,
        customer_id: &str,
        as_of: DateTime<Utc>,
        technical_names: &[String],
    ) -> ToggleResult<Vec<EntitlementSnapshot>>;
}

/// A transaction-scoped [`FeatureStore`].
///
/// Dropping an owning handle without committing rolls the transaction back.
#[async_trait]
pub trait StoreTransaction: FeatureStore {
    async fn commit(self: Box<Self>) -> ToggleResult<()>;

    async fn rollback(self: Box<Self>) -> ToggleResult<()>;

    /// Whether this handle opened the transaction and controls its end.
    fn is_owner(&self) -> bool;
}
