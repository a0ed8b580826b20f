//! Feature validation rules.

use crate::error::{ToggleError, ToggleResult};
use crate::model::FeatureDraft;
use std::fmt;
use std::sync::Arc;

type RuleFn = Arc<dyn Fn(&FeatureDraft) -> Result<(), String> + Send + Sync>;

/// Minimum length of a technical name, in characters.
pub const MIN_TECHNICAL_NAME_LEN: usize = 5;

/// An ordered list of checks run against every created or updated feature.
///
/// All rules run; failures are joined with `", "` into one `Validation` error.
#[derive(Clone)]
pub struct FeatureValidator {
    rules: Vec<RuleFn>,
}

impl FeatureValidator {
    /// A validator without rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a custom rule
    #[allow(clippy::should_implement_trait)]
    pub fn add<F>(mut self, rule: F) -> Self
    where
        F: Fn(&FeatureDraft) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(&self, draft: &FeatureDraft) -> ToggleResult<()> {
        let errors: Vec<String> = self
            .rules
            .iter()
            .filter_map(|rule| rule(draft).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToggleError::Validation(errors.join(", ")))
        }
    }
}

impl Default for FeatureValidator {
    /// The standard rule set.
    fn default() -> Self {
        Self::empty().add(technical_name_min_length(MIN_TECHNICAL_NAME_LEN))
    }
}

impl fmt::Debug for FeatureValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureValidator")
            .field("rules", &self.rules.len())
            .finish()
    }
}

/// Rule: the technical name has at least `min` characters.
pub fn technical_name_min_length(
    min: usize,
) -> impl Fn(&FeatureDraft) -> Result<(), String> + Send + Sync + 'static {
    move |draft| {
        if draft.technical_name.chars().count() < min {
            Err(format!(
                "'technicalName' must be at least {} characters long",
                min
            ))
        } else {
            Ok(())
        }
    }
}
