//! Feature toggle data model.
//!
//! The serde representation is the wire shape: `camelCase` keys, timestamps
//! as Unix milliseconds and absent optionals omitted.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Normalize a timestamp for storage and comparison.
///
/// Everything persisted is UTC truncated to whole milliseconds, so a token
/// echoed back through a millisecond transport still compares equal.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(3)
}

/// A live feature toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Unique lookup key used by clients
    pub technical_name: String,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When set, an entitlement disables the feature for that customer
    pub inverted: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// Entitled customers. Only populated by reads that join entitlements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customer_ids: Vec<String>,
}

impl Feature {
    /// Whether `as_of` is past the expiry. A feature without expiry never expires.
    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|expires| expires < as_of)
    }
}

/// Caller-supplied state of a feature, used by create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    pub technical_name: String,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub inverted: bool,

    #[serde(default)]
    pub customer_ids: Vec<String>,
}

impl FeatureDraft {
    pub fn new(technical_name: impl Into<String>) -> Self {
        Self {
            technical_name: technical_name.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expiry(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn with_customers<I, S>(mut self, customer_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customer_ids = customer_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Column values written by an optimistic update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureUpdate {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub technical_name: String,
    pub expires_on: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub inverted: bool,
    pub updated_at: DateTime<Utc>,
}

impl FeatureUpdate {
    pub fn from_draft(id: Uuid, draft: &FeatureDraft, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: draft.display_name.clone(),
            technical_name: draft.technical_name.clone(),
            expires_on: draft.expires_on.map(normalize_timestamp),
            description: draft.description.clone(),
            inverted: draft.inverted,
            updated_at: normalize_timestamp(updated_at),
        }
    }
}

/// Association granting a customer a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub id: Uuid,
    pub feature_id: Uuid,
    pub customer_id: String,
}

/// Historical record of an archived feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedFeature {
    pub id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    pub technical_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl ArchivedFeature {
    /// Archive `feature` at `archived_at`. Both timestamps become the archival moment.
    pub fn from_feature(feature: Feature, archived_at: DateTime<Utc>) -> Self {
        let archived_at = normalize_timestamp(archived_at);
        Self {
            id: feature.id,
            display_name: feature.display_name,
            technical_name: feature.technical_name,
            description: feature.description,
            created_at: archived_at,
            updated_at: archived_at,
        }
    }
}

/// One row of the evaluation read: a feature as seen by one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSnapshot {
    pub technical_name: String,
    pub inverted: bool,
    pub expired: bool,
    pub has_entitlement: bool,
}

/// Evaluation result for one feature and one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFeature {
    pub name: String,
    pub active: bool,
    pub inverted: bool,
    pub expired: bool,
}

impl From<EntitlementSnapshot> for CustomerFeature {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        // Expiry is reported but does not deactivate.
        Self {
            active: snapshot.has_entitlement && !snapshot.inverted,
            name: snapshot.technical_name,
            inverted: snapshot.inverted,
            expired: snapshot.expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at_millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn test_normalize_truncates_to_millis() {
        let ts = at_millis(1_700_000_000_123) + Duration::nanoseconds(456_789);
        assert_eq!(normalize_timestamp(ts), at_millis(1_700_000_000_123));
    }

    #[test]
    fn test_feature_wire_shape() {
        let feature = Feature {
            id: Uuid::nil(),
            display_name: None,
            technical_name: "feature-1".into(),
            expires_on: Some(at_millis(2_000)),
            description: None,
            inverted: true,
            created_at: at_millis(1_000),
            updated_at: at_millis(1_500),
            customer_ids: vec![],
        };

        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "00000000-0000-0000-0000-000000000000",
                "technicalName": "feature-1",
                "expiresOn": 2000,
                "inverted": true,
                "createdAt": 1000,
                "updatedAt": 1500,
            })
        );
    }

    #[test]
    fn test_draft_from_minimal_json() {
        let draft: FeatureDraft = serde_json::from_str(
            r#"{"technicalName": "feature-1", "customerIds": ["1234"]}"#,
        )
        .unwrap();

        assert_eq!(draft, FeatureDraft::new("feature-1").with_customers(["1234"]));
    }

    #[test]
    fn test_expiry() {
        let mut feature = Feature {
            id: Uuid::nil(),
            display_name: None,
            technical_name: "feature-1".into(),
            expires_on: None,
            description: None,
            inverted: false,
            created_at: at_millis(0),
            updated_at: at_millis(0),
            customer_ids: vec![],
        };
        assert!(!feature.is_expired(at_millis(i64::from(i32::MAX))));

        feature.expires_on = Some(at_millis(10));
        assert!(!feature.is_expired(at_millis(10)));
        assert!(feature.is_expired(at_millis(11)));
    }

    #[test]
    fn test_active_ignores_expiry() {
        let result = CustomerFeature::from(EntitlementSnapshot {
            technical_name: "feature-1".into(),
            inverted: false,
            expired: true,
            has_entitlement: true,
        });
        assert!(result.active);
        assert!(result.expired);
    }
}
