//! Credential discovery: `git credential fill`, then environment variables.

use std::io::Write;
use std::process::{Command, Stdio};

use reqwest::Url;
use tracing::debug;

use crate::error::{RemoteError, Result};

/// Username and password (or personal access token) for basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Ask the configured git credential helper for credentials for `url`.
///
/// Never prompts: `GIT_TERMINAL_PROMPT=0` is set for the helper.
pub fn git_credential_fill(url: &str) -> Result<Option<Credentials>> {
    let parsed = Url::parse(url).map_err(|e| RemoteError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| RemoteError::InvalidUrl {
        url: url.to_string(),
        reason: "no host".to_string(),
    })?;
    // git credential wants a trailing newline
    let input = format!(
        "protocol={}\nhost={}\npath={}\n\n",
        parsed.scheme(),
        host,
        parsed.path().trim_start_matches('/')
    );

    let mut child = Command::new("git")
        .args(["credential", "fill"])
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RemoteError::CredentialHelper(format!("failed to run git: {e}")))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RemoteError::CredentialHelper(format!(
            "git credential fill failed: {}",
            stderr.trim()
        )));
    }

    parse_credential_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the `key=value` lines printed by `git credential fill`.
pub fn parse_credential_output(out: &str) -> Result<Option<Credentials>> {
    let mut username = String::new();
    let mut password = String::new();
    for line in out.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            RemoteError::CredentialHelper(format!("invalid output line: {line:?}"))
        })?;
        match key {
            "username" => username = value.to_string(),
            "password" => password = value.to_string(),
            // input keys are echoed back, and newer git adds optional fields
            "protocol" | "host" | "path" | "capability[]" | "password_expiry_utc"
            | "oauth_refresh_token" => {}
            other => {
                return Err(RemoteError::CredentialHelper(format!(
                    "unknown output key: {other:?}"
                )))
            }
        }
    }
    if username.is_empty() || password.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Credentials { username, password }))
    }
}

/// Credentials for `url` from the git credential helper, falling back to the
/// `user_var`/`password_var` environment variables.
pub fn discover(url: &str, user_var: &str, password_var: &str) -> Option<Credentials> {
    match git_credential_fill(url) {
        Ok(Some(creds)) => return Some(creds),
        Ok(None) => debug!("No credentials from git credential helper for {}", url),
        Err(e) => debug!("git credential helper unavailable for {}: {}", url, e),
    }
    let username = std::env::var(user_var).ok().filter(|v| !v.is_empty())?;
    let password = std::env::var(password_var).ok().filter(|v| !v.is_empty())?;
    Some(Credentials { username, password })
}
