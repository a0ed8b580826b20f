//! In-memory [`FeatureStore`].
//!
//! Enforces the same rules as a relational backend: unique technical names,
//! one entitlement per (feature, customer), entitlements only for existing
//! features and cascade on delete. A transaction locks the whole store and
//! works on a copy that replaces the live state on commit.

use crate::error::{ToggleError, ToggleResult};
use crate::model::{ArchivedFeature, Entitlement, EntitlementSnapshot, Feature, FeatureUpdate};
use crate::store::{FeatureStore, StoreTransaction, TransactionOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use toggles_log::debug;
use uuid::Uuid;

/// Store operations that can be made to fail with [`MemoryFeatureStore::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Begin,
    Commit,
    FindFeature,
    FindAllFeatures,
    SaveFeature,
    UpdateFeature,
    DeleteFeature,
    SaveArchivedFeature,
    SaveEntitlements,
    DeleteEntitlements,
    FindCustomerIds,
    FindEntitlementSnapshot,
}

impl StoreOperation {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

#[derive(Debug, Clone, Default)]
struct Failures(Arc<AtomicU32>);

impl Failures {
    fn check(&self, op: StoreOperation) -> ToggleResult<()> {
        if self.0.load(Ordering::SeqCst) & op.bit() != 0 {
            return Err(ToggleError::infrastructure(format!(
                "injected failure in {:?}",
                op
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    features: BTreeMap<Uuid, Feature>,
    entitlements: Vec<Entitlement>,
    archived: Vec<ArchivedFeature>,
}

impl MemoryState {
    fn find_feature(&self, id: Uuid) -> ToggleResult<Feature> {
        self.features
            .get(&id)
            .cloned()
            .ok_or_else(|| ToggleError::feature_not_found(id))
    }

    fn customer_ids(&self, feature_id: Uuid) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entitlements
            .iter()
            .filter(|e| e.feature_id == feature_id)
            .map(|e| e.customer_id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn name_taken(&self, technical_name: &str, except: Option<Uuid>) -> bool {
        self.features
            .values()
            .any(|f| f.technical_name == technical_name && Some(f.id) != except)
    }

    fn save_feature(&mut self, feature: &Feature) -> ToggleResult<()> {
        if self.features.contains_key(&feature.id) {
            return Err(ToggleError::conflict(format!(
                "feature {} already exists",
                feature.id
            )));
        }
        if self.name_taken(&feature.technical_name, None) {
            return Err(ToggleError::conflict(format!(
                "technical name '{}' is already taken",
                feature.technical_name
            )));
        }

        let mut row = feature.clone();
        row.customer_ids.clear();
        self.features.insert(row.id, row);
        Ok(())
    }

    fn update_feature(
        &mut self,
        update: &FeatureUpdate,
        expected_updated_at: DateTime<Utc>,
    ) -> ToggleResult<()> {
        let matches = self
            .features
            .get(&update.id)
            .is_some_and(|f| f.updated_at == expected_updated_at);
        if !matches {
            return Err(ToggleError::feature_not_found(update.id));
        }
        if self.name_taken(&update.technical_name, Some(update.id)) {
            return Err(ToggleError::conflict(format!(
                "technical name '{}' is already taken",
                update.technical_name
            )));
        }

        if let Some(row) = self.features.get_mut(&update.id) {
            row.display_name = update.display_name.clone();
            row.technical_name = update.technical_name.clone();
            row.expires_on = update.expires_on;
            row.description = update.description.clone();
            row.inverted = update.inverted;
            row.updated_at = update.updated_at;
        }
        Ok(())
    }

    fn delete_feature(&mut self, id: Uuid) {
        if self.features.remove(&id).is_some() {
            self.entitlements.retain(|e| e.feature_id != id);
        }
    }

    fn save_archived_feature(&mut self, archived: &ArchivedFeature) -> ToggleResult<()> {
        if self.archived.iter().any(|a| a.id == archived.id) {
            return Err(ToggleError::conflict(format!(
                "archived feature {} already exists",
                archived.id
            )));
        }
        self.archived.push(archived.clone());
        Ok(())
    }

    fn save_entitlements(&mut self, batch: &[Entitlement]) -> ToggleResult<()> {
        let mut ids: BTreeSet<Uuid> = self.entitlements.iter().map(|e| e.id).collect();
        let mut pairs: BTreeSet<(Uuid, &str)> = self
            .entitlements
            .iter()
            .map(|e| (e.feature_id, e.customer_id.as_str()))
            .collect();

        for entitlement in batch {
            if !self.features.contains_key(&entitlement.feature_id) {
                return Err(ToggleError::constraint(format!(
                    "feature {} does not exist",
                    entitlement.feature_id
                )));
            }
            if !ids.insert(entitlement.id) {
                return Err(ToggleError::conflict(format!(
                    "entitlement {} already exists",
                    entitlement.id
                )));
            }
            if !pairs.insert((entitlement.feature_id, entitlement.customer_id.as_str())) {
                return Err(ToggleError::conflict(format!(
                    "customer '{}' is already entitled to feature {}",
                    entitlement.customer_id, entitlement.feature_id
                )));
            }
        }

        self.entitlements.extend_from_slice(batch);
        Ok(())
    }

    fn delete_entitlements(&mut self, feature_id: Uuid, customer_ids: &[String]) {
        self.entitlements
            .retain(|e| e.feature_id != feature_id || !customer_ids.contains(&e.customer_id));
    }

    fn snapshot(
        &self,
        customer_id: &str,
        as_of: DateTime<Utc>,
        technical_names: &[String],
    ) -> Vec<EntitlementSnapshot> {
        let mut rows: Vec<EntitlementSnapshot> = self
            .features
            .values()
            .filter(|f| technical_names.contains(&f.technical_name))
            .map(|f| EntitlementSnapshot {
                technical_name: f.technical_name.clone(),
                inverted: f.inverted,
                expired: f.is_expired(as_of),
                has_entitlement: self
                    .entitlements
                    .iter()
                    .any(|e| e.feature_id == f.id && e.customer_id == customer_id),
            })
            .collect();
        rows.sort_by(|a, b| a.technical_name.cmp(&b.technical_name));
        rows
    }
}

struct Working {
    /// Lock on the live state, released when the transaction ends.
    /// Never held across an await, so dropping the owner can always take it.
    live: std::sync::Mutex<Option<OwnedMutexGuard<MemoryState>>>,
    copy: Mutex<MemoryState>,
}

impl Working {
    fn take_live(&self) -> Option<OwnedMutexGuard<MemoryState>> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn is_open(&self) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

fn closed() -> ToggleError {
    ToggleError::infrastructure("transaction has already been committed or rolled back")
}

#[derive(Clone)]
enum Scope {
    Live(Arc<Mutex<MemoryState>>),
    Transaction(Arc<Working>),
}

impl Scope {
    async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> ToggleResult<R>,
    ) -> ToggleResult<R> {
        match self {
            Scope::Live(state) => f(&mut *state.lock().await),
            Scope::Transaction(working) => {
                let mut copy = working.copy.lock().await;
                if !working.is_open() {
                    return Err(closed());
                }
                f(&mut copy)
            }
        }
    }
}

/// In-memory feature store
#[derive(Clone)]
pub struct MemoryFeatureStore {
    scope: Scope,
    failures: Failures,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self {
            scope: Scope::Live(Arc::new(Mutex::new(MemoryState::default()))),
            failures: Failures::default(),
        }
    }

    /// Make every later call of `op` fail with an `Infrastructure` error.
    pub fn fail_on(&self, op: StoreOperation) {
        self.failures.0.fetch_or(op.bit(), Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.failures.0.store(0, Ordering::SeqCst);
    }

    async fn open(&self, state: Arc<Mutex<MemoryState>>) -> MemoryTransaction {
        let live = state.lock_owned().await;
        let copy = live.clone();
        debug!(target: "toggles::memory", "Began transaction");
        MemoryTransaction {
            store: MemoryFeatureStore {
                scope: Scope::Transaction(Arc::new(Working {
                    live: std::sync::Mutex::new(Some(live)),
                    copy: Mutex::new(copy),
                })),
                failures: self.failures.clone(),
            },
            owner: true,
        }
    }

    /// Archived features, in archival order.
    pub async fn archived_features(&self) -> ToggleResult<Vec<ArchivedFeature>> {
        self.scope.with_state(|s| Ok(s.archived.clone())).await
    }

    /// Number of stored entitlements across all features.
    pub async fn entitlement_count(&self) -> ToggleResult<usize> {
        self.scope.with_state(|s| Ok(s.entitlements.len())).await
    }
}

impl Default for MemoryFeatureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureStore for MemoryFeatureStore {
    async fn begin(&self, _options: TransactionOptions) -> ToggleResult<Box<dyn StoreTransaction>> {
        self.failures.check(StoreOperation::Begin)?;

        match &self.scope {
            Scope::Live(state) => Ok(Box::new(self.open(state.clone()).await)),
            Scope::Transaction(_) => Ok(Box::new(MemoryTransaction {
                store: self.clone(),
                owner: false,
            })),
        }
    }

    async fn find_feature(&self, id: Uuid) -> ToggleResult<Feature> {
        self.failures.check(StoreOperation::FindFeature)?;
        self.scope.with_state(|s| s.find_feature(id)).await
    }

    async fn find_feature_with_entitlements(&self, id: Uuid) -> ToggleResult<Feature> {
        self.failures.check(StoreOperation::FindFeature)?;
        self.scope
            .with_state(|s| {
                let mut feature = s.find_feature(id)?;
                feature.customer_ids = s.customer_ids(id);
                Ok(feature)
            })
            .await
    }

    async fn find_all_features(&self) -> ToggleResult<Vec<Feature>> {
        self.failures.check(StoreOperation::FindAllFeatures)?;
        self.scope
            .with_state(|s| {
                let mut features: Vec<Feature> = s.features.values().cloned().collect();
                features.sort_by(|a, b| a.technical_name.cmp(&b.technical_name));
                Ok(features)
            })
            .await
    }

    async fn save_feature(&self, feature: &Feature) -> ToggleResult<()> {
        self.failures.check(StoreOperation::SaveFeature)?;
        self.scope.with_state(|s| s.save_feature(feature)).await
    }

    async fn update_feature(
        &self,
        update: &FeatureUpdate,
        expected_updated_at: DateTime<Utc>,
    ) -> ToggleResult<()> {
        self.failures.check(StoreOperation::UpdateFeature)?;
        self.scope
            .with_state(|s| s.update_feature(update, expected_updated_at))
            .await
    }

    async fn delete_feature(&self, id: Uuid) -> ToggleResult<()> {
        self.failures.check(StoreOperation::DeleteFeature)?;
        self.scope
            .with_state(|s| {
                s.delete_feature(id);
                Ok(())
            })
            .await
    }

    async fn save_archived_feature(&self, archived: &ArchivedFeature) -> ToggleResult<()> {
        self.failures.check(StoreOperation::SaveArchivedFeature)?;
        self.scope
            .with_state(|s| s.save_archived_feature(archived))
            .await
    }

    async fn save_entitlements(&self, entitlements: &[Entitlement]) -> ToggleResult<()> {
        if entitlements.is_empty() {
            return Ok(());
        }
        self.failures.check(StoreOperation::SaveEntitlements)?;
        self.scope
            .with_state(|s| s.save_entitlements(entitlements))
            .await
    }

    async fn delete_entitlements_by_customer_ids(
        &self,
        feature_id: Uuid,
        customer_ids: &[String],
    ) -> ToggleResult<()> {
        if customer_ids.is_empty() {
            return Ok(());
        }
        self.failures.check(StoreOperation::DeleteEntitlements)?;
        self.scope
            .with_state(|s| {
                s.delete_entitlements(feature_id, customer_ids);
                Ok(())
            })
            .await
    }

    async fn find_customer_ids_by_feature_id(&self, feature_id: Uuid) -> ToggleResult<Vec<String>> {
        self.failures.check(StoreOperation::FindCustomerIds)?;
        self.scope.with_state(|s| Ok(s.customer_ids(feature_id))).await
    }

    async fn find_entitlement_snapshot(
        &self,
        customer_id: &str,
        as_of: DateTime<Utc>,
        technical_names: &[String],
    ) -> ToggleResult<Vec<EntitlementSnapshot>> {
        self.failures.check(StoreOperation::FindEntitlementSnapshot)?;
        self.scope
            .with_state(|s| Ok(s.snapshot(customer_id, as_of, technical_names)))
            .await
    }
}

/// Transaction handle of a [`MemoryFeatureStore`]
pub struct MemoryTransaction {
    store: MemoryFeatureStore,
    owner: bool,
}

impl MemoryTransaction {
    async fn finish(&self, commit: bool) -> ToggleResult<()> {
        let Scope::Transaction(working) = &self.store.scope else {
            return Ok(());
        };

        let mut copy = working.copy.lock().await;
        let Some(mut live) = working.take_live() else {
            return Err(closed());
        };

        if commit {
            *live = std::mem::take(&mut *copy);
            debug!(target: "toggles::memory", "Committed transaction");
        } else {
            debug!(target: "toggles::memory", "Rolled back transaction");
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        if let Scope::Transaction(working) = &self.store.scope
            && working.take_live().is_some()
        {
            debug!(target: "toggles::memory", "Rolled back abandoned transaction");
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> ToggleResult<()> {
        if !self.owner {
            return Ok(());
        }
        self.store.failures.check(StoreOperation::Commit)?;
        self.finish(true).await
    }

    async fn rollback(self: Box<Self>) -> ToggleResult<()> {
        if !self.owner {
            return Ok(());
        }
        self.finish(false).await
    }

    fn is_owner(&self) -> bool {
        self.owner
    }
}

#[async_trait]
impl FeatureStore for MemoryTransaction {
    async fn begin(&self, options: TransactionOptions) -> ToggleResult<Box<dyn StoreTransaction>> {
        self.store.begin(options).await
    }

    async fn find_feature(&self, id: Uuid) -> ToggleResult<Feature> {
        self.store.find_feature(id).await
    }

    async fn find_feature_with_entitlements(&self, id: Uuid) -> ToggleResult<Feature> {
        self.store.find_feature_with_entitlements(id).await
    }

    async fn find_all_features(&self) -> ToggleResult<Vec<Feature>> {
        self.store.find_all_features().await
    }

    async fn save_feature(&self, feature: &Feature) -> ToggleResult<()> {
        self.store.save_feature(feature).await
    }

    async fn update_feature(
        &self,
        update: &FeatureUpdate,
        expected_updated_at: DateTime<Utc>,
    ) -> ToggleResult<()> {
        self.store.update_feature(update, expected_updated_at).await
    }

    async fn delete_feature(&self, id: Uuid) -> ToggleResult<()> {
        self.store.delete_feature(id).await
    }

    async fn save_archived_feature(&self, archived: &ArchivedFeature) -> ToggleResult<()> {
        self.store.save_archived_feature(archived).await
    }

    async fn save_entitlements(&self, entitlements: &[Entitlement]) -> ToggleResult<()> {
        self.store.save_entitlements(entitlements).await
    }

    async fn delete_entitlements_by_customer_ids(
        &self,
        feature_id: Uuid,
        customer_ids: &[String],
    ) -> ToggleResult<()> {
        self.store
            .delete_entitlements_by_customer_ids(feature_id, customer_ids)
            .await
    }

    async fn find_customer_ids_by_feature_id(&self, feature_id: Uuid) -> ToggleResult<Vec<String>> {
        self.store.find_customer_ids_by_feature_id(feature_id).await
    }

    async fn find_entitlement_snapshot(
        &self,
        customer_id: &str,
        as_of: DateTime<Utc>,
        technical_names: &[String],
    ) -> ToggleResult<Vec<EntitlementSnapshot>> {
        self.store
            .find_entitlement_snapshot(customer_id, as_of, technical_names)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn feature(n: u128, name: &str) -> Feature {
        Feature {
            id: Uuid::from_u128(n),
            display_name: None,
            technical_name: name.to_string(),
            expires_on: None,
            description: None,
            inverted: false,
            created_at: now(),
            updated_at: now(),
            customer_ids: vec![],
        }
    }

    fn entitlement(n: u128, feature: &Feature, customer: &str) -> Entitlement {
        Entitlement {
            id: Uuid::from_u128(n),
            feature_id: feature.id,
            customer_id: customer.to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_technical_name() {
        let store = MemoryFeatureStore::new();
        store.save_feature(&feature(1, "feature-1")).await.unwrap();

        let err = store.save_feature(&feature(2, "feature-1")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_entitlement_rules() {
        let store = MemoryFeatureStore::new();
        let f = feature(1, "feature-1");
        store.save_feature(&f).await.unwrap();
        store
            .save_entitlements(&[entitlement(10, &f, "a")])
            .await
            .unwrap();

        let duplicate = store
            .save_entitlements(&[entitlement(11, &f, "b"), entitlement(12, &f, "a")])
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind(), crate::ErrorKind::Conflict);
        // The failed batch left nothing behind.
        assert_eq!(store.entitlement_count().await.unwrap(), 1);

        let missing = feature(2, "feature-2");
        let orphan = store
            .save_entitlements(&[entitlement(13, &missing, "a")])
            .await
            .unwrap_err();
        assert_eq!(orphan.kind(), crate::ErrorKind::Constraint);

        store.save_entitlements(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades_and_is_scoped() {
        let store = MemoryFeatureStore::new();
        let f1 = feature(1, "feature-1");
        let f2 = feature(2, "feature-2");
        store.save_feature(&f1).await.unwrap();
        store.save_feature(&f2).await.unwrap();
        store
            .save_entitlements(&[entitlement(10, &f1, "a"), entitlement(11, &f2, "a")])
            .await
            .unwrap();

        store
            .delete_entitlements_by_customer_ids(f1.id, &["a".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.find_customer_ids_by_feature_id(f2.id).await.unwrap(),
            vec!["a"]
        );

        store.delete_feature(f2.id).await.unwrap();
        assert_eq!(store.entitlement_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_optimistic_update() {
        let store = MemoryFeatureStore::new();
        let f = feature(1, "feature-1");
        store.save_feature(&f).await.unwrap();

        let mut update = FeatureUpdate::from_draft(
            f.id,
            &crate::FeatureDraft::new("feature-one"),
            now() + Duration::seconds(1),
        );

        let stale = store
            .update_feature(&update, now() - Duration::seconds(1))
            .await
            .unwrap_err();
        assert_eq!(stale, ToggleError::feature_not_found(f.id));

        store.update_feature(&update, now()).await.unwrap();
        let stored = store.find_feature(f.id).await.unwrap();
        assert_eq!(stored.technical_name, "feature-one");
        assert_eq!(stored.created_at, now());

        update.id = Uuid::from_u128(99);
        let missing = store.update_feature(&update, now()).await.unwrap_err();
        assert_eq!(missing.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_drop() {
        let store = MemoryFeatureStore::new();

        let tx = store.begin(TransactionOptions::default()).await.unwrap();
        tx.save_feature(&feature(1, "feature-1")).await.unwrap();
        drop(tx);
        assert!(store.find_all_features().await.unwrap().is_empty());

        let tx = store.begin(TransactionOptions::default()).await.unwrap();
        tx.save_feature(&feature(1, "feature-1")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.find_all_features().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nested_begin_shares_the_transaction() {
        let store = MemoryFeatureStore::new();

        let outer = store.begin(TransactionOptions::default()).await.unwrap();
        let inner = outer.begin(TransactionOptions::default()).await.unwrap();
        assert!(outer.is_owner());
        assert!(!inner.is_owner());

        inner.save_feature(&feature(1, "feature-1")).await.unwrap();
        inner.commit().await.unwrap();

        // Visible inside the outer handle, not yet outside.
        assert!(outer.find_feature(Uuid::from_u128(1)).await.is_ok());
        outer.rollback().await.unwrap();
        assert!(store.find_all_features().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_releases_store_while_joined_handle_is_busy() {
        let store = MemoryFeatureStore::new();
        let Scope::Live(state) = &store.scope else {
            unreachable!()
        };
        let tx = store.open(state.clone()).await;
        tx.save_feature(&feature(1, "feature-1")).await.unwrap();

        let Scope::Transaction(working) = &tx.store.scope else {
            unreachable!()
        };
        let working = working.clone();
        let joined = MemoryFeatureStore {
            scope: Scope::Transaction(working.clone()),
            failures: Failures::default(),
        };

        // A joined handle is mid-call when the owner goes away.
        let busy = working.copy.lock().await;
        drop(tx);

        let live = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.find_all_features(),
        )
        .await
        .expect("live state still locked")
        .unwrap();
        assert!(live.is_empty());

        drop(busy);
        let err = joined.find_all_features().await.unwrap_err();
        assert_eq!(err, closed());
    }

    #[tokio::test]
    async fn test_snapshot() {
        let store = MemoryFeatureStore::new();
        let mut expired = feature(1, "feature-b");
        expired.expires_on = Some(now() - Duration::days(1));
        let mut inverted = feature(2, "feature-a");
        inverted.inverted = true;
        store.save_feature(&expired).await.unwrap();
        store.save_feature(&inverted).await.unwrap();
        store
            .save_entitlements(&[entitlement(10, &inverted, "1234")])
            .await
            .unwrap();

        let names = ["feature-b", "feature-a", "unknown"].map(String::from);
        let rows = store
            .find_entitlement_snapshot("1234", now(), &names)
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                EntitlementSnapshot {
                    technical_name: "feature-a".into(),
                    inverted: true,
                    expired: false,
                    has_entitlement: true,
                },
                EntitlementSnapshot {
                    technical_name: "feature-b".into(),
                    inverted: false,
                    expired: true,
                    has_entitlement: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryFeatureStore::new();
        store.fail_on(StoreOperation::FindAllFeatures);
        assert_eq!(
            store.find_all_features().await.unwrap_err().kind(),
            crate::ErrorKind::Infrastructure
        );

        store.clear_failures();
        assert!(store.find_all_features().await.is_ok());
    }
}
