//! Integration tests for common toggles workflows.
//!
//! Each workflow runs against the in-memory store and against SQLite, so both
//! stores are held to the same behavior.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use toggles::prelude::*;
use toggles::{FixedClock, SequentialIds};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

struct Harness {
    clock: Arc<FixedClock>,
    features: FeatureService,
    evaluation: EvaluationService,
}

fn harness(store: Arc<dyn FeatureStore>) -> Harness {
    let clock = Arc::new(FixedClock::new(start()));
    Harness {
        features: FeatureService::new(store.clone())
            .with_clock(clock.clone())
            .with_id_generator(Arc::new(SequentialIds::new())),
        evaluation: EvaluationService::new(store).with_clock(clock.clone()),
        clock,
    }
}

async fn sqlite_store() -> Arc<dyn FeatureStore> {
    let db = Database::connect(DatabaseConfig::sqlite_memory())
        .await
        .unwrap();
    migrate(db.connection()).await.unwrap();
    Arc::new(db.feature_store())
}

fn memory_store() -> Arc<dyn FeatureStore> {
    Arc::new(MemoryFeatureStore::new())
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// =============================================================================
// Evaluation
// =============================================================================

async fn evaluation_matrix(store: Arc<dyn FeatureStore>) {
    let h = harness(store);

    h.features
        .create_feature(FeatureDraft::new("plain-feature").with_customers(["acme"]))
        .await
        .unwrap();
    h.features
        .create_feature(
            FeatureDraft::new("inverted-feature")
                .inverted(true)
                .with_customers(["acme"]),
        )
        .await
        .unwrap();
    h.features
        .create_feature(
            FeatureDraft::new("expiring-feature")
                .with_expiry(start() + Duration::hours(1))
                .with_customers(["acme"]),
        )
        .await
        .unwrap();

    let requested = names(&[
        "plain-feature",
        "inverted-feature",
        "expiring-feature",
        "unknown-feature",
    ]);

    let acme = h.evaluation.evaluate("acme", &requested).await.unwrap();
    assert_eq!(
        acme,
        vec![
            CustomerFeature {
                name: "expiring-feature".into(),
                active: true,
                inverted: false,
                expired: false,
            },
            CustomerFeature {
                name: "inverted-feature".into(),
                active: false,
                inverted: true,
                expired: false,
            },
            CustomerFeature {
                name: "plain-feature".into(),
                active: true,
                inverted: false,
                expired: false,
            },
        ]
    );

    let globex = h.evaluation.evaluate("globex", &requested).await.unwrap();
    assert!(globex.iter().all(|f| !f.active));

    h.clock.advance(Duration::hours(2));
    let later = h
        .evaluation
        .evaluate("acme", &names(&["expiring-feature"]))
        .await
        .unwrap();
    assert!(later[0].expired);
    assert!(later[0].active);
}

#[tokio::test]
async fn test_evaluation_matrix_memory() {
    evaluation_matrix(memory_store()).await;
}

#[tokio::test]
async fn test_evaluation_matrix_sqlite() {
    evaluation_matrix(sqlite_store().await).await;
}

// =============================================================================
// Optimistic updates
// =============================================================================

async fn concurrent_editors(store: Arc<dyn FeatureStore>) {
    let h = harness(store);

    let feature = h
        .features
        .create_feature(FeatureDraft::new("checkout-v2").with_customers(["acme", "globex"]))
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(1));
    let first = h
        .features
        .update_feature(
            feature.id,
            feature.updated_at,
            FeatureDraft::new("checkout-v2").with_customers(["acme", "initech"]),
        )
        .await
        .unwrap();
    assert_eq!(first.customer_ids, vec!["acme", "initech"]);

    h.clock.advance(Duration::seconds(1));
    let second = h
        .features
        .update_feature(
            feature.id,
            feature.updated_at,
            FeatureDraft::new("checkout-v3"),
        )
        .await
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::NotFound);
    assert_eq!(
        second.to_string(),
        format!("update feature: feature {} does not exist", feature.id)
    );

    let stored = h.features.get_feature(feature.id).await.unwrap();
    assert_eq!(stored, first);
}

#[tokio::test]
async fn test_concurrent_editors_memory() {
    concurrent_editors(memory_store()).await;
}

#[tokio::test]
async fn test_concurrent_editors_sqlite() {
    concurrent_editors(sqlite_store().await).await;
}

async fn same_millisecond_editors(store: Arc<dyn FeatureStore>) {
    let h = harness(store);

    let feature = h
        .features
        .create_feature(FeatureDraft::new("checkout-v2").with_customers(["acme"]))
        .await
        .unwrap();

    let first = h
        .features
        .update_feature(
            feature.id,
            feature.updated_at,
            FeatureDraft::new("checkout-v2").with_customers(["globex"]),
        )
        .await
        .unwrap();

    let second = h
        .features
        .update_feature(feature.id, feature.updated_at, FeatureDraft::new("checkout-v3"))
        .await
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::NotFound);
    assert_eq!(h.features.get_feature(feature.id).await.unwrap(), first);
}

#[tokio::test]
async fn test_same_millisecond_editors_memory() {
    same_millisecond_editors(memory_store()).await;
}

#[tokio::test]
async fn test_same_millisecond_editors_sqlite() {
    same_millisecond_editors(sqlite_store().await).await;
}

// =============================================================================
// Archival
// =============================================================================

async fn archive_frees_name(store: Arc<dyn FeatureStore>) {
    let h = harness(store);

    let feature = h
        .features
        .create_feature(FeatureDraft::new("checkout-v2").with_customers(["acme"]))
        .await
        .unwrap();

    h.clock.advance(Duration::days(1));
    let archived = h.features.archive_feature(feature.id).await.unwrap();
    assert_eq!(archived.id, feature.id);
    assert_eq!(archived.created_at, start() + Duration::days(1));
    assert_eq!(archived.updated_at, archived.created_at);

    let err = h.features.archive_feature(feature.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let recreated = h
        .features
        .create_feature(FeatureDraft::new("checkout-v2"))
        .await
        .unwrap();
    assert_ne!(recreated.id, feature.id);
    assert!(
        h.evaluation
            .evaluate("acme", &names(&["checkout-v2"]))
            .await
            .unwrap()
            .iter()
            .all(|f| !f.active)
    );
}

#[tokio::test]
async fn test_archive_frees_name_memory() {
    archive_frees_name(memory_store()).await;
}

#[tokio::test]
async fn test_archive_frees_name_sqlite() {
    archive_frees_name(sqlite_store().await).await;
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_database_config_from_settings_file() {
    use toggles::toggles_config::ConfigManager;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toggles.toml");
    std::fs::write(
        &path,
        "[database]\nurl = \"sqlite::memory:\"\nmax_connections = 3\n",
    )
    .unwrap();

    let mut config = ConfigManager::new();
    config.load_auto(&path).unwrap();

    let db = DatabaseConfig::new(config.get_string("database.url").unwrap())
        .max_connections(config.get_parsed("database.max_connections").unwrap());
    assert_eq!(db.database_url, "sqlite::memory:");
    assert_eq!(db.max_connections, 3);
}
