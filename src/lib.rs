// Toggles - feature toggles with per-customer entitlements
//
// This library gathers the toggles crates: the core services and in-memory
// store, logging, layered configuration and the SQL store.

// Re-export core functionality
pub use toggles_core::*;

// Re-export logging
pub use toggles_log;

// Re-export optional crates
#[cfg(feature = "config")]
pub use toggles_config;

#[cfg(feature = "seaorm")]
pub use toggles_seaorm;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ArchivedFeature, Clock, CustomerFeature, ErrorKind, EvaluationService, Feature,
        FeatureDraft, FeatureService, FeatureStore, IdGenerator, MemoryFeatureStore,
        StoreTransaction, ToggleError, ToggleResult, TransactionOptions,
    };

    #[cfg(feature = "seaorm")]
    pub use toggles_seaorm::{Database, DatabaseConfig, SeaOrmFeatureStore, migrate};
}
