use serde::{Deserialize, Serialize};

/// A commit read from local history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Raw commit message, subject included.
    pub message: String,
}

impl Commit {
    pub fn new(hash: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            message: message.into(),
        }
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        short_hash(&self.hash)
    }
}

/// First 12 characters of `hash`, or all of it when shorter or when the
/// cut would split a character.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// A change to trigger, optionally pinned to one of its revisions.
///
/// `change_id` is whatever the review system accepts as a change identifier:
/// a change number, a `Change-Id` trailer value, or the compound
/// `project~branch~Change-Id` form. An empty `revision` means the change's
/// current revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    pub change_id: String,
    pub revision: String,
}

impl Revision {
    /// The latest revision of a change.
    pub fn latest(change_id: impl Into<String>) -> Self {
        Self {
            change_id: change_id.into(),
            revision: String::new(),
        }
    }

    /// A specific revision of a change.
    pub fn pinned(change_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            change_id: change_id.into(),
            revision: revision.into(),
        }
    }

    pub fn is_latest(&self) -> bool {
        self.revision.is_empty()
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_latest() {
            write!(f, "{}@current", self.change_id)
        } else {
            write!(f, "{}@{}", self.change_id, self.revision)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_revision_is_empty() {
        let rev = Revision::latest("1234");
        assert!(rev.is_latest());
        assert_eq!(rev.to_string(), "1234@current");
    }

    #[test]
    fn test_pinned_revision_display() {
        let rev = Revision::pinned("I0123", "abcdef");
        assert!(!rev.is_latest());
        assert_eq!(rev.to_string(), "I0123@abcdef");
    }

    #[test]
    fn test_commit_short_handles_short_hashes() {
        assert_eq!(Commit::new("abc", "msg").short(), "abc");
        assert_eq!(
            Commit::new("0123456789abcdef0123", "msg").short(),
            "0123456789ab"
        );
    }

    #[test]
    fn test_short_hash_never_splits_characters() {
        // 11 ASCII bytes then a 2-byte character straddling the cut
        let odd = "0123456789aé-rest";
        assert_eq!(short_hash(odd), odd);
        assert_eq!(Commit::new(odd, "msg").short(), odd);
    }
}
