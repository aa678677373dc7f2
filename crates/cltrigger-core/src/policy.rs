//! Skip-if-already-approved trigger policy.

use crate::domain::ChangeMetadata;

/// Label the CI system votes on.
pub const DEFAULT_RESULT_LABEL: &str = "TryBot-Result";

/// Vote value meaning the CI run passed.
pub const DEFAULT_APPROVED_VALUE: i32 = 1;

/// Decides whether a revision needs a new trigger.
///
/// A trigger is skipped only when the current revision is requested and the
/// result label already carries an approving vote. The label name and the
/// approving value follow the review backend's label schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub label: String,
    pub approved_value: i32,
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self {
            label: DEFAULT_RESULT_LABEL.to_string(),
            approved_value: DEFAULT_APPROVED_VALUE,
        }
    }
}

impl TriggerPolicy {
    pub fn new(label: impl Into<String>, approved_value: i32) -> Self {
        Self {
            label: label.into(),
            approved_value,
        }
    }

    pub fn should_trigger(&self, meta: &ChangeMetadata, requested: &str, force: bool) -> bool {
        if force {
            return true;
        }
        let is_current = meta.resolve_revision(requested) == meta.current_revision;
        !(is_current && meta.has_vote(&self.label, self.approved_value))
    }
}
