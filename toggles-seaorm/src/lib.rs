//! # Toggles SeaORM
//!
//! SQL persistence for the toggles services, on PostgreSQL or SQLite.
//!
//! ## Features
//!
//! - **Feature store**: [`SeaOrmFeatureStore`] implements
//!   [`toggles_core::FeatureStore`] on a pooled connection or a transaction
//! - **Transactions**: reentrant handles with configurable isolation
//! - **Schema bootstrap**: [`migrate`] creates missing tables and indexes
//! - **Error mapping**: unique and foreign key violations surface as
//!   `Conflict` and `Constraint`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toggles_core::{FeatureDraft, FeatureService};
//! use toggles_seaorm::{Database, DatabaseConfig, migrate};
//!
//! let db = Database::connect(DatabaseConfig::new("postgres://localhost/toggles")).await?;
//! migrate(db.connection()).await?;
//!
//! let service = FeatureService::new(Arc::new(db.feature_store()));
//! let feature = service.create_feature(FeatureDraft::new("checkout-v2")).await?;
//! ```

#![warn(clippy::all)]

mod config;
mod database;
pub mod entity;
mod error;
mod schema;
mod store;
mod transaction;

pub use config::*;
pub use database::*;
pub use error::*;
pub use schema::migrate;
pub use store::SeaOrmFeatureStore;
pub use transaction::{StoreHandle, TransactionHandle};

// Re-export sea-orm types for convenience
pub use sea_orm;
pub use sea_query;

/// Prelude module for commonly used types.
pub mod prelude {
    pub use super::{Database, DatabaseConfig, SeaOrmError, SeaOrmFeatureStore, SeaOrmResult};
    pub use super::{StoreHandle, TransactionHandle, migrate};
    pub use toggles_core::{FeatureStore, StoreTransaction, TransactionOptions};
}
