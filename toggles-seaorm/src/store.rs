//! [`FeatureStore`] over a SeaORM connection or transaction.

use crate::entity::{archived_feature, customer_feature, feature};
use crate::error::classify;
use crate::transaction::{StoreHandle, TransactionHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Condition, Expr, JoinType, Order, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use toggles_core::{
    ArchivedFeature, Entitlement, EntitlementSnapshot, Feature, FeatureStore, FeatureUpdate,
    StoreTransaction, ToggleError, ToggleResult, TransactionOptions,
};
use uuid::Uuid;

/// SQL-backed feature store.
///
/// `SeaOrmFeatureStore<DatabaseConnection>` runs each call on the pool;
/// [`begin`](FeatureStore::begin) returns a store bound to a transaction.
#[derive(Clone)]
pub struct SeaOrmFeatureStore<H = DatabaseConnection> {
    handle: H,
}

impl<H: StoreHandle> SeaOrmFeatureStore<H> {
    pub fn new(handle: H) -> Self {
        Self { handle }
    }

    fn conn(&self) -> &H::Conn {
        self.handle.connection()
    }
}

#[derive(Debug, FromQueryResult)]
struct SnapshotRow {
    technical_name: String,
    inverted: bool,
    expires_on: Option<DateTime<Utc>>,
    entitlement_id: Option<Uuid>,
}

impl SnapshotRow {
    fn into_snapshot(self, as_of: DateTime<Utc>) -> EntitlementSnapshot {
        EntitlementSnapshot {
            technical_name: self.technical_name,
            inverted: self.inverted,
            expired: self.expires_on.is_some_and(|expiry| expiry < as_of),
            has_entitlement: self.entitlement_id.is_some(),
        }
    }
}

#[async_trait]
impl<H: StoreHandle> FeatureStore for SeaOrmFeatureStore<H> {
    async fn begin(&self, options: TransactionOptions) -> ToggleResult<Box<dyn StoreTransaction>> {
        let handle = self.handle.begin(options).await.map_err(classify)?;
        Ok(Box::new(SeaOrmFeatureStore::new(handle)))
    }

    async fn find_feature(&self, id: Uuid) -> ToggleResult<Feature> {
        feature::Entity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(classify)?
            .map(Feature::from)
            .ok_or_else(|| ToggleError::feature_not_found(id))
    }

    async fn find_feature_with_entitlements(&self, id: Uuid) -> ToggleResult<Feature> {
        let mut feature = self.find_feature(id).await?;
        feature.customer_ids = self.find_customer_ids_by_feature_id(id).await?;
        Ok(feature)
    }

    async fn find_all_features(&self) -> ToggleResult<Vec<Feature>> {
        let rows = feature::Entity::find()
            .order_by_asc(feature::Column::TechnicalName)
            .all(self.conn())
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().map(Feature::from).collect())
    }

    async fn save_feature(&self, feature: &Feature) -> ToggleResult<()> {
        feature::Entity::insert(feature::ActiveModel::from(feature))
            .exec_without_returning(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_feature(
        &self,
        update: &FeatureUpdate,
        expected_updated_at: DateTime<Utc>,
    ) -> ToggleResult<()> {
        let changes = feature::ActiveModel {
            display_name: Set(update.display_name.clone()),
            technical_name: Set(update.technical_name.clone()),
            expires_on: Set(update.expires_on),
            description: Set(update.description.clone()),
            inverted: Set(update.inverted),
            updated_at: Set(update.updated_at),
            ..Default::default()
        };

        let result = feature::Entity::update_many()
            .set(changes)
            .filter(feature::Column::Id.eq(update.id))
            .filter(feature::Column::UpdatedAt.eq(expected_updated_at))
            .exec(self.conn())
            .await
            .map_err(classify)?;

        if result.rows_affected == 0 {
            return Err(ToggleError::feature_not_found(update.id));
        }
        Ok(())
    }

    async fn delete_feature(&self, id: Uuid) -> ToggleResult<()> {
        feature::Entity::delete_by_id(id)
            .exec(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn save_archived_feature(&self, archived: &ArchivedFeature) -> ToggleResult<()> {
        archived_feature::Entity::insert(archived_feature::ActiveModel::from(archived))
            .exec_without_returning(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn save_entitlements(&self, entitlements: &[Entitlement]) -> ToggleResult<()> {
        if entitlements.is_empty() {
            return Ok(());
        }

        customer_feature::Entity::insert_many(
            entitlements.iter().map(customer_feature::ActiveModel::from),
        )
        .exec_without_returning(self.conn())
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn delete_entitlements_by_customer_ids(
        &self,
        feature_id: Uuid,
        customer_ids: &[String],
    ) -> ToggleResult<()> {
        if customer_ids.is_empty() {
            return Ok(());
        }

        customer_feature::Entity::delete_many()
            .filter(customer_feature::Column::FeatureId.eq(feature_id))
            .filter(customer_feature::Column::CustomerId.is_in(customer_ids.iter().cloned()))
            .exec(self.conn())
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_customer_ids_by_feature_id(&self, feature_id: Uuid) -> ToggleResult<Vec<String>> {
        customer_feature::Entity::find()
            .select_only()
            .column(customer_feature::Column::CustomerId)
            .filter(customer_feature::Column::FeatureId.eq(feature_id))
            .order_by_asc(customer_feature::Column::CustomerId)
            .into_tuple::<String>()
            .all(self.conn())
            .await
            .map_err(classify)
    }

    async fn find_entitlement_snapshot(
        &self,
        customer_id: &str,
        as_of: DateTime<Utc>,
        technical_names: &[String],
    ) -> ToggleResult<Vec<EntitlementSnapshot>> {
        if technical_names.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::select()
            .column((feature::Entity, feature::Column::TechnicalName))
            .column((feature::Entity, feature::Column::Inverted))
            .column((feature::Entity, feature::Column::ExpiresOn))
            .expr_as(
                Expr::col((customer_feature::Entity, customer_feature::Column::Id)),
                Alias::new("entitlement_id"),
            )
            .from(feature::Entity)
            .join(
                JoinType::LeftJoin,
                customer_feature::Entity,
                Condition::all()
                    .add(
                        Expr::col((customer_feature::Entity, customer_feature::Column::FeatureId))
                            .equals((feature::Entity, feature::Column::Id)),
                    )
                    .add(
                        Expr::col((
                            customer_feature::Entity,
                            customer_feature::Column::CustomerId,
                        ))
                        .eq(customer_id),
                    ),
            )
            .and_where(
                Expr::col((feature::Entity, feature::Column::TechnicalName))
                    .is_in(technical_names.iter().cloned()),
            )
            .order_by((feature::Entity, feature::Column::TechnicalName), Order::Asc)
            .to_owned();

        let backend = self.conn().get_database_backend();
        let rows = SnapshotRow::find_by_statement(backend.build(&query))
            .all(self.conn())
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().map(|row| row.into_snapshot(as_of)).collect())
    }
}

#[async_trait]
impl StoreTransaction for SeaOrmFeatureStore<TransactionHandle> {
    async fn commit(self: Box<Self>) -> ToggleResult<()> {
        self.handle.finish(true).await.map_err(classify)
    }

    async fn rollback(self: Box<Self>) -> ToggleResult<()> {
        self.handle.finish(false).await.map_err(classify)
    }

    fn is_owner(&self) -> bool {
        self.handle.is_owner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(expires_on: Option<DateTime<Utc>>, entitled: bool) -> SnapshotRow {
        SnapshotRow {
            technical_name: "checkout-v2".into(),
            inverted: false,
            expires_on,
            entitlement_id: entitled.then(Uuid::new_v4),
        }
    }

    #[test]
    fn test_snapshot_expiry_is_strict() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert!(!row(None, true).into_snapshot(now).expired);
        assert!(!row(Some(now), true).into_snapshot(now).expired);
        assert!(
            row(Some(now - chrono::Duration::milliseconds(1)), false)
                .into_snapshot(now)
                .expired
        );
    }

    #[test]
    fn test_snapshot_entitlement_from_join() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert!(row(None, true).into_snapshot(now).has_entitlement);
        assert!(!row(None, false).into_snapshot(now).has_entitlement);
    }
}
