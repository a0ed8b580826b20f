//! Table definitions.

/// Live features.
pub mod feature {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "features")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub display_name: Option<String>,
        #[sea_orm(unique)]
        pub technical_name: String,
        pub expires_on: Option<ChronoDateTimeUtc>,
        pub description: Option<String>,
        pub inverted: bool,
        pub created_at: ChronoDateTimeUtc,
        pub updated_at: ChronoDateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::customer_feature::Entity")]
        CustomerFeature,
    }

    impl Related<super::customer_feature::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::CustomerFeature.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Customer entitlements, one row per (feature, customer).
pub mod customer_feature {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "customer_features")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub feature_id: Uuid,
        pub customer_id: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::feature::Entity",
            from = "Column::FeatureId",
            to = "super::feature::Column::Id",
            on_delete = "Cascade"
        )]
        Feature,
    }

    impl Related<super::feature::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Feature.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Archived features. Technical names may repeat here.
pub mod archived_feature {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "archived_features")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub display_name: Option<String>,
        pub technical_name: String,
        pub description: Option<String>,
        pub created_at: ChronoDateTimeUtc,
        pub updated_at: ChronoDateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

use toggles_core::{ArchivedFeature, Entitlement, Feature};

impl From<feature::Model> for Feature {
    fn from(model: feature::Model) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
            technical_name: model.technical_name,
            expires_on: model.expires_on,
            description: model.description,
            inverted: model.inverted,
            created_at: model.created_at,
            updated_at: model.updated_at,
            customer_ids: Vec::new(),
        }
    }
}

impl From<&Feature> for feature::ActiveModel {
    fn from(feature: &Feature) -> Self {
        use sea_orm::Set;

        Self {
            id: Set(feature.id),
            display_name: Set(feature.display_name.clone()),
            technical_name: Set(feature.technical_name.clone()),
            expires_on: Set(feature.expires_on),
            description: Set(feature.description.clone()),
            inverted: Set(feature.inverted),
            created_at: Set(feature.created_at),
            updated_at: Set(feature.updated_at),
        }
    }
}

impl From<&Entitlement> for customer_feature::ActiveModel {
    fn from(entitlement: &Entitlement) -> Self {
        use sea_orm::Set;

        Self {
            id: Set(entitlement.id),
            feature_id: Set(entitlement.feature_id),
            customer_id: Set(entitlement.customer_id.clone()),
        }
    }
}

impl From<&ArchivedFeature> for archived_feature::ActiveModel {
    fn from(archived: &ArchivedFeature) -> Self {
        use sea_orm::Set;

        Self {
            id: Set(archived.id),
            display_name: Set(archived.display_name.clone()),
            technical_name: Set(archived.technical_name.clone()),
            description: Set(archived.description.clone()),
            created_at: Set(archived.created_at),
            updated_at: Set(archived.updated_at),
        }
    }
}

impl From<archived_feature::Model> for ArchivedFeature {
    fn from(model: archived_feature::Model) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
            technical_name: model.technical_name,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
