//! Turning command-line arguments and local history into revisions.
//!
//! Follows the git-codereview conventions: with no arguments a single pending
//! commit is used implicitly, `HEAD` means "every pending commit", and any
//! other argument must name one of the pending commits.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{short_hash, Commit, Revision};
use crate::error::{Result, TriggerError};
use crate::ports::CommitHistoryReader;
use crate::trailer::{change_id_from_message, compound_change_id};

/// Argument meaning "all pending commits".
pub const HEAD: &str = "HEAD";

/// Resolves user input into a de-duplicated, non-empty list of revisions.
pub struct ChangeResolver<'a, R: ?Sized> {
    history: &'a R,
    owner: String,
    repo: String,
}

impl<'a, R: CommitHistoryReader + ?Sized> ChangeResolver<'a, R> {
    /// `owner`/`repo` name the review-system project, used to build compound
    /// identifiers when the branch has an upstream.
    pub fn new(history: &'a R, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            history,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Resolve `args`.
    ///
    /// With `explicit` set the arguments are change numbers or IDs and the
    /// latest revision of each is used. Otherwise they are commit references
    /// checked against the pending commits of the current branch.
    pub fn resolve(&self, args: &[String], explicit: bool) -> Result<Vec<Revision>> {
        let args = dedup_args(args);
        if explicit {
            return resolve_explicit(&args);
        }
        self.resolve_derived(&args)
    }

    fn resolve_derived(&self, args: &[&str]) -> Result<Vec<Revision>> {
        let branchpoint = self.history.branchpoint()?;
        let pending = self.history.log(&format!("{branchpoint}..HEAD"))?;
        debug!(
            "{} pending commit(s) since {}",
            pending.len(),
            short_hash(&branchpoint)
        );

        if pending.is_empty() {
            return Err(TriggerError::validation("no pending commits"));
        }
        let has_head = args.contains(&HEAD);
        if has_head && args.len() > 1 {
            return Err(TriggerError::validation(
                "HEAD can only be supplied as an argument by itself",
            ));
        }
        if args.is_empty() && pending.len() > 1 {
            return Err(TriggerError::validation(
                "must specify commits as arguments or use HEAD for everything",
            ));
        }

        let selected: Vec<&Commit> = if has_head || args.is_empty() {
            pending.iter().collect()
        } else {
            self.select_pending(args, &pending)?
        };

        let upstream = self.history.upstream_branch()?;
        selected
            .into_iter()
            .map(|commit| {
                let change_id = self.change_id_for(commit, upstream.as_deref())?;
                Ok(Revision::pinned(change_id, commit.hash.clone()))
            })
            .collect()
    }

    /// Match each argument to exactly one pending commit, collapsing
    /// arguments that resolve to the same hash.
    fn select_pending<'p>(&self, args: &[&str], pending: &'p [Commit]) -> Result<Vec<&'p Commit>> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for arg in args {
            let commit = self
                .history
                .resolve_single(arg)
                .map_err(|e| TriggerError::lookup(*arg, lookup_reason(e)))?;
            if !seen.insert(commit.hash.clone()) {
                continue;
            }
            let found = pending
                .iter()
                .find(|pc| pc.hash == commit.hash)
                .ok_or_else(|| {
                    TriggerError::lookup(
                        *arg,
                        format!("commit {} is not a pending commit", commit.hash),
                    )
                })?;
            selected.push(found);
        }
        Ok(selected)
    }

    fn change_id_for(&self, commit: &Commit, upstream: Option<&str>) -> Result<String> {
        let raw = change_id_from_message(&commit.message).map_err(|e| {
            TriggerError::validation(format!(
                "failed to derive change ID from commit {}: {e}",
                commit.short()
            ))
        })?;
        Ok(match upstream {
            Some(branch) if !branch.is_empty() => {
                compound_change_id(&self.owner, &self.repo, branch, &raw)
            }
            _ => raw,
        })
    }
}

fn resolve_explicit(args: &[&str]) -> Result<Vec<Revision>> {
    if args.is_empty() {
        return Err(TriggerError::validation(
            "must provide at least one change number or ID",
        ));
    }
    Ok(args.iter().map(|a| Revision::latest(*a)).collect())
}

/// Drop repeated arguments, keeping first-seen order.
fn dedup_args(args: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    args.iter()
        .map(String::as_str)
        .filter(|a| seen.insert(*a))
        .collect()
}

fn lookup_reason(err: TriggerError) -> String {
    match err {
        TriggerError::Lookup { reason, .. } => reason,
        TriggerError::Git(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryHistory;

    fn msg(id: &str) -> String {
        format!("subject\n\nChange-Id: {id}\n")
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_explicit_mode_requires_arguments() {
        let history = MemoryHistory::new("bp");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&[], true).unwrap_err();
        assert!(matches!(err, TriggerError::Validation(_)));
    }

    #[test]
    fn test_explicit_mode_uses_latest_revision_without_history() {
        // No pending commits: explicit mode must not look at history at all.
        let history = MemoryHistory::new("bp");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let revs = resolver.resolve(&args(&["1234", "I99", "1234"]), true).unwrap();
        assert_eq!(revs, vec![Revision::latest("1234"), Revision::latest("I99")]);
    }

    #[test]
    fn test_single_pending_commit_is_implicit() {
        let history = MemoryHistory::new("bp").with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let implicit = resolver.resolve(&[], false).unwrap();
        let head = resolver.resolve(&args(&["HEAD"]), false).unwrap();
        assert_eq!(implicit, vec![Revision::pinned("I1", "c1")]);
        assert_eq!(implicit, head);
    }

    #[test]
    fn test_no_pending_commits_fails_even_with_arguments() {
        let history = MemoryHistory::new("bp");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&args(&["abc"]), false).unwrap_err();
        assert_eq!(err.to_string(), "no pending commits");
    }

    #[test]
    fn test_head_with_other_argument_fails() {
        let history = MemoryHistory::new("bp")
            .with_pending("c2", &msg("I2"))
            .with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&args(&["HEAD", "c1"]), false).unwrap_err();
        assert!(err.to_string().contains("HEAD can only be supplied"));
    }

    #[test]
    fn test_repeated_head_is_still_alone() {
        let history = MemoryHistory::new("bp").with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let revs = resolver.resolve(&args(&["HEAD", "HEAD"]), false).unwrap();
        assert_eq!(revs.len(), 1);
    }

    #[test]
    fn test_multiple_pending_without_arguments_fails() {
        let history = MemoryHistory::new("bp")
            .with_pending("c2", &msg("I2"))
            .with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&[], false).unwrap_err();
        assert!(err.to_string().contains("must specify commits"));
    }

    #[test]
    fn test_head_selects_all_pending_in_history_order() {
        let history = MemoryHistory::new("bp")
            .with_pending("c2", &msg("I2"))
            .with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let revs = resolver.resolve(&args(&["HEAD"]), false).unwrap();
        assert_eq!(
            revs,
            vec![Revision::pinned("I2", "c2"), Revision::pinned("I1", "c1")]
        );
    }

    #[test]
    fn test_aliases_of_same_commit_collapse() {
        let history = MemoryHistory::new("bp")
            .with_pending("c2", &msg("I2"))
            .with_pending("c1", &msg("I1"))
            .with_alias("HEAD~1", "c1");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let revs = resolver.resolve(&args(&["c1", "HEAD~1"]), false).unwrap();
        assert_eq!(revs, vec![Revision::pinned("I1", "c1")]);
    }

    #[test]
    fn test_non_pending_commit_is_lookup_error() {
        let history = MemoryHistory::new("bp")
            .with_pending("c1", &msg("I1"))
            .with_commit("old", &msg("I0"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&args(&["old"]), false).unwrap_err();
        match err {
            TriggerError::Lookup { arg, reason } => {
                assert_eq!(arg, "old");
                assert!(reason.contains("not a pending commit"));
            }
            other => panic!("expected lookup error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_ref_is_lookup_error() {
        let history = MemoryHistory::new("bp").with_pending("c1", &msg("I1"));
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&args(&["nope"]), false).unwrap_err();
        assert!(matches!(err, TriggerError::Lookup { ref arg, .. } if arg == "nope"));
    }

    #[test]
    fn test_missing_trailer_fails_resolution() {
        let history = MemoryHistory::new("bp").with_pending("c1", "subject only\n");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let err = resolver.resolve(&[], false).unwrap_err();
        assert!(err.to_string().contains("failed to derive change ID"));
    }

    #[test]
    fn test_upstream_branch_produces_compound_id() {
        let history = MemoryHistory::new("bp")
            .with_pending("c1", &msg("I1234"))
            .with_upstream("main");
        let resolver = ChangeResolver::new(&history, "o", "r");
        let revs = resolver.resolve(&[], false).unwrap();
        assert_eq!(revs, vec![Revision::pinned("o/r~main~I1234", "c1")]);
    }
}
