//! Port definitions for the systems cltrigger talks to.
//!
//! - `CommitHistoryReader`: local git history
//! - `ReviewSystemClient`: change metadata lookup (Gerrit)
//! - `DispatchSink`: trigger delivery (GitHub repository_dispatch)
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::domain::{ChangeMetadata, Commit, DispatchEvent};
use crate::error::Result;

// ---------------------------------------------------------------------------
// CommitHistoryReader
// ---------------------------------------------------------------------------

/// Read access to the local commit history.
///
/// Calls are cheap local operations, so this trait is synchronous.
pub trait CommitHistoryReader {
    /// The most recent commit shared with the upstream branch.
    fn branchpoint(&self) -> Result<String>;

    /// Commits in `range` (git revision range syntax), newest first.
    fn log(&self, range: &str) -> Result<Vec<Commit>>;

    /// Resolve `rev` to exactly one commit. Ambiguous or unknown refs fail.
    fn resolve_single(&self, rev: &str) -> Result<Commit>;

    /// Name of the branch the current branch tracks, without the remote
    /// prefix. `None` when no upstream is configured.
    fn upstream_branch(&self) -> Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// ReviewSystemClient
// ---------------------------------------------------------------------------

/// Change lookup in the review system.
#[async_trait]
pub trait ReviewSystemClient: Send + Sync {
    /// Fetch the change with all revisions and label votes.
    ///
    /// Returns `TriggerError::NotFound` when the identifier matches nothing.
    async fn get_change(&self, change_id: &str) -> Result<ChangeMetadata>;
}

// ---------------------------------------------------------------------------
// DispatchSink
// ---------------------------------------------------------------------------

/// Delivers a trigger to a downstream repository.
#[async_trait]
pub trait DispatchSink: Send + Sync {
    async fn deliver(&self, owner: &str, repo: &str, event: &DispatchEvent) -> Result<()>;
}
