//! Feature management commands.

use super::{App, parse_timestamp, to_json};
use crate::error::{CliError, CliResult};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::{Value, json};
use std::io::Read;
use std::path::{Path, PathBuf};
use toggles_core::FeatureDraft;
use uuid::Uuid;

/// Feature state for `create` and `update`, from flags or a JSON document.
#[derive(Args, Debug, Default)]
pub struct DraftArgs {
    /// Read the feature from a JSON file ("-" for stdin)
    #[arg(
        long,
        value_name = "FILE",
        conflicts_with_all = ["technical_name", "display_name", "description", "expires_on", "inverted", "customers"]
    )]
    pub input: Option<PathBuf>,

    /// Unique key clients evaluate the feature by
    #[arg(long, required_unless_present = "input")]
    pub technical_name: Option<String>,

    /// Human readable name
    #[arg(long)]
    pub display_name: Option<String>,

    /// Free-form description
    #[arg(long)]
    pub description: Option<String>,

    /// Expiry as Unix milliseconds or RFC 3339
    #[arg(long, value_parser = parse_timestamp)]
    pub expires_on: Option<DateTime<Utc>>,

    /// Entitled customers lose the feature instead of gaining it
    #[arg(long)]
    pub inverted: bool,

    /// Entitled customer (repeatable)
    #[arg(long = "customer", value_name = "CUSTOMER_ID")]
    pub customers: Vec<String>,
}

impl DraftArgs {
    pub fn into_draft(self) -> CliResult<FeatureDraft> {
        if let Some(path) = self.input {
            return read_draft(&path);
        }

        let technical_name = self.technical_name.ok_or_else(|| {
            CliError::InvalidArgument("--technical-name or --input is required".into())
        })?;

        Ok(FeatureDraft {
            display_name: self.display_name,
            technical_name,
            expires_on: self.expires_on,
            description: self.description,
            inverted: self.inverted,
            customer_ids: self.customers,
        })
    }
}

/// Parse a feature document: `technicalName`, optional `displayName`,
/// `description`, `expiresOn` (Unix ms), `inverted` and `customerIds`.
fn read_draft(path: &Path) -> CliResult<FeatureDraft> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    parse_draft(&content)
}

fn parse_draft(content: &str) -> CliResult<FeatureDraft> {
    serde_json::from_str(content)
        .map_err(|e| CliError::InvalidArgument(format!("decode feature: {}", e)))
}

pub async fn list(app: &App) -> CliResult<Value> {
    let features = app.features.list_features().await?;
    to_json(&features)
}

pub async fn get(app: &App, id: Uuid) -> CliResult<Value> {
    let feature = app.features.get_feature(id).await?;
    to_json(&feature)
}

pub async fn create(app: &App, draft: FeatureDraft) -> CliResult<Value> {
    let feature = app.features.create_feature(draft).await?;
    to_json(&feature)
}

pub async fn update(
    app: &App,
    id: Uuid,
    last_updated_at: DateTime<Utc>,
    draft: FeatureDraft,
) -> CliResult<Value> {
    let feature = app.features.update_feature(id, last_updated_at, draft).await?;
    to_json(&feature)
}

pub async fn archive(app: &App, id: Uuid) -> CliResult<Value> {
    let archived = app.features.archive_feature(id).await?;
    to_json(&archived)
}

pub async fn add_customers(app: &App, id: Uuid, customer_ids: Vec<String>) -> CliResult<Value> {
    let added = customer_ids.len();
    app.features.add_customers(id, customer_ids).await?;
    Ok(json!({ "featureId": id, "added": added }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use toggles_core::MemoryFeatureStore;

    fn app() -> App {
        App::new(Arc::new(MemoryFeatureStore::new()), None)
    }

    #[test]
    fn test_parse_draft_document() {
        let draft = parse_draft(
            r#"{
                "technicalName": "checkout-v2",
                "displayName": "Checkout",
                "expiresOn": 1714564800000,
                "customerIds": ["acme"]
            }"#,
        )
        .unwrap();

        assert_eq!(draft.technical_name, "checkout-v2");
        assert_eq!(draft.display_name.as_deref(), Some("Checkout"));
        assert_eq!(draft.expires_on.map(|t| t.timestamp_millis()), Some(1714564800000));
        assert!(!draft.inverted);
        assert_eq!(draft.customer_ids, vec!["acme"]);

        let err = parse_draft(r#"{"displayName": "no name"}"#).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_flags_into_draft() {
        let args = DraftArgs {
            technical_name: Some("checkout-v2".into()),
            inverted: true,
            customers: vec!["acme".into(), "globex".into()],
            ..Default::default()
        };
        let draft = args.into_draft().unwrap();

        assert_eq!(
            draft,
            FeatureDraft::new("checkout-v2")
                .inverted(true)
                .with_customers(["acme", "globex"])
        );

        let err = DraftArgs::default().into_draft().unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_feature_lifecycle_output() {
        let app = app();

        let created = create(
            &app,
            FeatureDraft::new("checkout-v2").with_customers(["acme", "globex"]),
        )
        .await
        .unwrap();
        assert_eq!(created["technicalName"], "checkout-v2");
        assert_eq!(created["customerIds"], json!(["acme", "globex"]));
        assert!(created.get("displayName").is_none());
        assert!(created["updatedAt"].is_i64());

        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();
        let last_updated_at =
            DateTime::from_timestamp_millis(created["updatedAt"].as_i64().unwrap()).unwrap();

        let added = add_customers(&app, id, vec!["initech".into()]).await.unwrap();
        assert_eq!(added["added"], 1);

        let updated = update(
            &app,
            id,
            last_updated_at,
            FeatureDraft::new("checkout-v2").with_display_name("Checkout"),
        )
        .await
        .unwrap();
        assert_eq!(updated["displayName"], "Checkout");
        assert!(updated.get("customerIds").is_none());

        let listed = list(&app).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let archived = archive(&app, id).await.unwrap();
        assert_eq!(archived["technicalName"], "checkout-v2");

        let err = get(&app, id).await.unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
