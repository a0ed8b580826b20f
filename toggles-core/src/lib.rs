//! Feature toggles for customers.
//!
//! A feature is a named switch with an optional expiry, an inversion flag and
//! a list of entitled customers. This crate holds the rules for changing
//! features and for evaluating them; persistence sits behind the
//! [`FeatureStore`] trait.
//!
//! # Features
//!
//! - **Create** a feature with its initial customers, atomically
//! - **Update** under optimistic concurrency, reconciling the customer list
//! - **Archive** a feature into an immutable record
//! - **Evaluate** which features are active for a customer
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use toggles_core::*;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryFeatureStore::new());
//! let features = FeatureService::new(store.clone());
//! let evaluation = EvaluationService::new(store);
//!
//! features
//!     .create_feature(FeatureDraft::new("feature-1").with_customers(["1234"]))
//!     .await?;
//!
//! let results = evaluation
//!     .evaluate("1234", &["feature-1".to_string()])
//!     .await?;
//! assert!(results[0].active);
//! # Ok::<(), ToggleError>(())
//! # }).unwrap();
//! ```
//!
//! # Optimistic Concurrency
//!
//! Updates carry the `updated_at` the caller last saw. A stale value and a
//! missing feature both fail with [`ErrorKind::NotFound`]:
//!
//! ```
//! use std::sync::Arc;
//! use toggles_core::*;
//!
//! # tokio_test::block_on(async {
//! let service = FeatureService::new(Arc::new(MemoryFeatureStore::new()));
//! let created = service.create_feature(FeatureDraft::new("feature-1")).await?;
//!
//! let stale = created.updated_at - chrono::Duration::seconds(1);
//! let err = service
//!     .update_feature(created.id, stale, FeatureDraft::new("feature-1"))
//!     .await
//!     .unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! # Ok::<(), ToggleError>(())
//! # }).unwrap();
//! ```

pub mod entitlement;
pub mod error;
pub mod evaluation;
pub mod memory;
pub mod model;
pub mod service;
pub mod source;
pub mod store;
pub mod validation;

pub use entitlement::EntitlementDiff;
pub use error::{ErrorKind, ResultExt, ToggleError, ToggleResult};
pub use evaluation::EvaluationService;
pub use memory::{MemoryFeatureStore, MemoryTransaction, StoreOperation};
pub use model::{
    ArchivedFeature, CustomerFeature, Entitlement, EntitlementSnapshot, Feature, FeatureDraft,
    FeatureUpdate, normalize_timestamp,
};
pub use service::FeatureService;
pub use source::{
    Clock, FixedClock, IdGenerationError, IdGenerator, RandomIds, SequentialIds, SystemClock,
};
pub use store::{FeatureStore, IsolationLevel, StoreTransaction, TransactionOptions};
pub use validation::FeatureValidator;
