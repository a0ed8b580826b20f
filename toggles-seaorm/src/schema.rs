//! Schema bootstrap.

use crate::entity::{archived_feature, customer_feature, feature};
use crate::{SeaOrmError, SeaOrmResult};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, EntityName, Schema};
use toggles_log::{debug, info};

const ENTITLEMENT_INDEX: &str = "idx_customer_features_feature_customer";

/// Create the feature tables if they do not exist yet.
///
/// Safe to run on every start.
pub async fn migrate<C>(db: &C) -> SeaOrmResult<()>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema
            .create_table_from_entity(feature::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(customer_feature::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(archived_feature::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for table in &tables {
        db.execute(backend.build(table))
            .await
            .map_err(|e| SeaOrmError::Migration(e.to_string()))?;
    }

    let index = Index::create()
        .name(ENTITLEMENT_INDEX)
        .table(customer_feature::Entity)
        .col(customer_feature::Column::FeatureId)
        .col(customer_feature::Column::CustomerId)
        .unique()
        .if_not_exists()
        .to_owned();

    db.execute(backend.build(&index))
        .await
        .map_err(|e| SeaOrmError::Migration(e.to_string()))?;

    debug!(index = ENTITLEMENT_INDEX; "Ensured entitlement index");
    info!(
        tables = [
            feature::Entity.table_name(),
            customer_feature::Entity.table_name(),
            archived_feature::Entity.table_name(),
        ]
        .join(", ");
        "Schema is up to date"
    );

    Ok(())
}
