use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single patchset of a change as reported by the review system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Fetchable ref, e.g. `refs/changes/52/551352/140`.
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub patchset: u32,
}

/// A recorded vote on a review label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub value: i32,
}

/// Review-system snapshot of a change.
///
/// Fetched once per dispatch attempt; never cached across revisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeMetadata {
    /// Numeric change number.
    pub number: u64,
    /// Branch the change targets.
    pub target_branch: String,
    /// Hash of the latest revision.
    pub current_revision: String,
    /// Revision hash to patchset details.
    pub revisions: HashMap<String, RevisionInfo>,
    /// Label name to recorded votes.
    pub approvals: HashMap<String, Vec<Vote>>,
}

impl ChangeMetadata {
    /// The revision a request maps to: `requested` if set, else the current one.
    pub fn resolve_revision<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.is_empty() {
            &self.current_revision
        } else {
            requested
        }
    }

    /// Whether any vote on `label` equals `value`.
    pub fn has_vote(&self, label: &str, value: i32) -> bool {
        self.approvals
            .get(label)
            .map(|votes| votes.iter().any(|v| v.value == value))
            .unwrap_or(false)
    }
}
