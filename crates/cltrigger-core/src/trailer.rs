//! Change identifiers derived from commit messages.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TriggerError};

/// Trailer key carrying the review-system change identifier.
pub const CHANGE_ID_TRAILER: &str = "Change-Id";

fn change_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^Change-Id: (.*)$").expect("valid Change-Id regex"))
}

/// Extract the `Change-Id` trailer value from a commit message.
///
/// Exactly one trailer line must be present.
pub fn change_id_from_message(message: &str) -> Result<String> {
    let matches: Vec<&str> = change_id_regex()
        .captures_iter(message)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('\r'))
        .collect();

    match matches.as_slice() {
        [id] if !id.trim().is_empty() => Ok(id.trim().to_string()),
        [] => Err(TriggerError::validation(format!(
            "no {CHANGE_ID_TRAILER} trailer in commit message"
        ))),
        [_] => Err(TriggerError::validation(format!(
            "empty {CHANGE_ID_TRAILER} trailer in commit message"
        ))),
        many => Err(TriggerError::validation(format!(
            "found {} {CHANGE_ID_TRAILER} trailers in commit message, expected exactly one",
            many.len()
        ))),
    }
}

/// Build the `owner/repo~branch~id` form that names a change unambiguously
/// even when the same `Change-Id` exists on several branches.
///
/// Each component is escaped on its own so that separators inside a
/// component (a `/` in a branch name, say) cannot be confused with the
/// separators of the compound form.
pub fn compound_change_id(owner: &str, repo: &str, branch: &str, change_id: &str) -> String {
    format!(
        "{}/{}~{}~{}",
        escape_component(owner),
        escape_component(repo),
        escape_component(branch),
        escape_component(change_id)
    )
}

/// Percent-encode every byte outside `[A-Za-z0-9-._]`.
pub fn escape_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
