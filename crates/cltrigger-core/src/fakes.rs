//! In-memory fakes for the ports (testing only)
//!
//! Provides `MemoryHistory`, `MemoryReviewSystem` and `RecordingSink` that
//! satisfy the trait contracts without git, Gerrit or GitHub.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{ChangeMetadata, Commit, DispatchEvent, RevisionInfo, TriggerPayload, Vote};
use crate::error::{Result, TriggerError};
use crate::ports::{CommitHistoryReader, DispatchSink, ReviewSystemClient};

// ---------------------------------------------------------------------------
// MemoryHistory
// ---------------------------------------------------------------------------

/// Commit history with a fixed branchpoint and pending set.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    branchpoint: String,
    pending: Vec<Commit>,
    others: Vec<Commit>,
    aliases: HashMap<String, String>,
    upstream: Option<String>,
}

impl MemoryHistory {
    pub fn new(branchpoint: &str) -> Self {
        Self {
            branchpoint: branchpoint.to_string(),
            ..Self::default()
        }
    }

    /// Append a pending commit. Add them newest first, as `git log` lists them.
    pub fn with_pending(mut self, hash: &str, message: &str) -> Self {
        self.pending.push(Commit::new(hash, message));
        self
    }

    /// A commit that resolves but is not pending.
    pub fn with_commit(mut self, hash: &str, message: &str) -> Self {
        self.others.push(Commit::new(hash, message));
        self
    }

    /// Make `name` resolve to `hash`.
    pub fn with_alias(mut self, name: &str, hash: &str) -> Self {
        self.aliases.insert(name.to_string(), hash.to_string());
        self
    }

    pub fn with_upstream(mut self, branch: &str) -> Self {
        self.upstream = Some(branch.to_string());
        self
    }
}

impl CommitHistoryReader for MemoryHistory {
    fn branchpoint(&self) -> Result<String> {
        Ok(self.branchpoint.clone())
    }

    fn log(&self, range: &str) -> Result<Vec<Commit>> {
        if range == format!("{}..HEAD", self.branchpoint) {
            Ok(self.pending.clone())
        } else {
            Err(TriggerError::Git(format!("unexpected range {range}")))
        }
    }

    fn resolve_single(&self, rev: &str) -> Result<Commit> {
        let hash = if rev == "HEAD" {
            match self.pending.first() {
                Some(c) => c.hash.as_str(),
                None => self.branchpoint.as_str(),
            }
        } else {
            self.aliases.get(rev).map(String::as_str).unwrap_or(rev)
        };
        self.pending
            .iter()
            .chain(self.others.iter())
            .find(|c| c.hash == hash)
            .cloned()
            .ok_or_else(|| TriggerError::lookup(rev, "unknown revision"))
    }

    fn upstream_branch(&self) -> Result<Option<String>> {
        Ok(self.upstream.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryReviewSystem
// ---------------------------------------------------------------------------

/// Review system holding a fixed set of changes keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryReviewSystem {
    changes: HashMap<String, ChangeMetadata>,
    lookups: Mutex<Vec<String>>,
}

impl MemoryReviewSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register change `number` under `id` with one patchset per hash, in
    /// order. The last hash is the current revision.
    pub fn with_change(mut self, id: &str, number: u64, hashes: &[&str]) -> Self {
        let revisions = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| {
                let patchset = i as u32 + 1;
                (
                    hash.to_string(),
                    RevisionInfo {
                        git_ref: format!("refs/changes/{:02}/{}/{}", number % 100, number, patchset),
                        patchset,
                    },
                )
            })
            .collect();
        self.changes.insert(
            id.to_string(),
            ChangeMetadata {
                number,
                target_branch: "master".to_string(),
                current_revision: hashes.last().map(|h| h.to_string()).unwrap_or_default(),
                revisions,
                approvals: HashMap::new(),
            },
        );
        self
    }

    /// Record a vote on a registered change.
    pub fn with_vote(mut self, id: &str, label: &str, value: i32) -> Self {
        if let Some(change) = self.changes.get_mut(id) {
            change
                .approvals
                .entry(label.to_string())
                .or_default()
                .push(Vote { value });
        }
        self
    }

    /// Identifiers passed to `get_change`, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewSystemClient for MemoryReviewSystem {
    async fn get_change(&self, change_id: &str) -> Result<ChangeMetadata> {
        self.lookups.lock().unwrap().push(change_id.to_string());
        self.changes
            .get(change_id)
            .cloned()
            .ok_or_else(|| TriggerError::NotFound(change_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that records successful deliveries as `(owner, repo, event)`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(String, String, DispatchEvent)>>,
    failing_repos: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every delivery to `repo`.
    pub fn failing_for(mut self, repo: &str) -> Self {
        self.failing_repos.insert(repo.to_string());
        self
    }

    /// Every delivered event.
    pub fn events(&self) -> Vec<(String, String, DispatchEvent)> {
        self.delivered.lock().unwrap().clone()
    }

    /// The change carried by each delivered event; events without one are
    /// left out.
    pub fn delivered(&self) -> Vec<(String, String, TriggerPayload)> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(owner, repo, event)| {
                event
                    .change()
                    .map(|p| (owner.clone(), repo.clone(), p.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl DispatchSink for RecordingSink {
    async fn deliver(&self, owner: &str, repo: &str, event: &DispatchEvent) -> Result<()> {
        if self.failing_repos.contains(repo) {
            return Err(TriggerError::Delivery {
                kind: event.kind().to_string(),
                target: format!("{owner}/{repo}"),
                reason: "status code 500".to_string(),
            });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((owner.to_string(), repo.to_string(), event.clone()));
        Ok(())
    }
}
