//! Git-backed commit history reader.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::domain::Commit;
use crate::error::{Result, TriggerError};
use crate::ports::CommitHistoryReader;

/// Separates the hash from the body within one `git log` record.
const FIELD_SEP: char = '\u{1f}';
/// Terminates one `git log` record.
const RECORD_SEP: char = '\u{1e}';

/// Branch used for the branchpoint when the current branch tracks nothing.
pub const DEFAULT_BRANCH: &str = "master";

/// Reads history by running `git` in a work tree.
#[derive(Debug, Clone)]
pub struct GitHistoryReader {
    repo_dir: PathBuf,
    default_branch: String,
}

impl GitHistoryReader {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    /// Branch on `origin` to compare against when no upstream is configured.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.repo_dir, args)
    }

    /// Full name of the upstream ref, e.g. `refs/remotes/origin/main`.
    fn upstream_ref(&self) -> Option<String> {
        self.git(&["rev-parse", "--symbolic-full-name", "@{upstream}"])
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl CommitHistoryReader for GitHistoryReader {
    fn branchpoint(&self) -> Result<String> {
        let upstream = self
            .upstream_ref()
            .unwrap_or_else(|| format!("origin/{}", self.default_branch));
        debug!("Computing branchpoint against {}", upstream);
        let out = self.git(&["merge-base", "HEAD", &upstream])?;
        Ok(out.trim().to_string())
    }

    fn log(&self, range: &str) -> Result<Vec<Commit>> {
        let format = format!("--format=%H{FIELD_SEP}%B{RECORD_SEP}");
        let out = self.git(&["log", &format, range, "--"])?;
        Ok(parse_log(&out))
    }

    fn resolve_single(&self, rev: &str) -> Result<Commit> {
        let spec = format!("{rev}^{{commit}}");
        let hash = self
            .git(&["rev-parse", "--verify", "--quiet", "--end-of-options", &spec])
            .map_err(|_| TriggerError::lookup(rev, "unknown or ambiguous revision"))?;
        let hash = hash.trim().to_string();
        let message = self.git(&["log", "-1", "--format=%B", &hash, "--"])?;
        Ok(Commit { hash, message })
    }

    fn upstream_branch(&self) -> Result<Option<String>> {
        Ok(self.upstream_ref().map(|r| branch_name(&r).to_string()))
    }
}

/// Strip `refs/heads/` or `refs/remotes/<remote>/` from a full ref name.
fn branch_name(full_ref: &str) -> &str {
    if let Some(rest) = full_ref.strip_prefix("refs/heads/") {
        return rest;
    }
    if let Some(rest) = full_ref.strip_prefix("refs/remotes/") {
        return rest.split_once('/').map(|(_, b)| b).unwrap_or(rest);
    }
    full_ref
}

fn parse_log(out: &str) -> Vec<Commit> {
    out.split(RECORD_SEP)
        .map(|record| record.trim_start_matches(['\n', '\r']))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            record
                .split_once(FIELD_SEP)
                .map(|(hash, body)| Commit::new(hash.trim(), body))
        })
        .collect()
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| TriggerError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TriggerError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Top-level directory of the work tree containing `dir`.
pub fn show_toplevel(dir: &Path) -> Result<PathBuf> {
    let out = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    let top = out.trim();
    if top.is_empty() {
        return Err(TriggerError::Git(
            "git rev-parse --show-toplevel returned empty output".to_string(),
        ));
    }
    Ok(PathBuf::from(top))
}
