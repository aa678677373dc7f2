//! Gerrit REST client
//!
//! Looks changes up through `GET /changes/<id>` and maps the response onto
//! [`ChangeMetadata`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cltrigger_core::{ChangeMetadata, ReviewSystemClient, RevisionInfo, TriggerError, Vote};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::Result;

/// Prefix Gerrit puts in front of every JSON body.
const XSSI_PREFIX: &str = ")]}'";

/// Options requesting every patchset and every vote.
const CHANGE_OPTIONS: &str = "o=ALL_REVISIONS&o=DETAILED_LABELS";

#[derive(Debug, Deserialize)]
struct ChangeInfo {
    #[serde(rename = "_number")]
    number: u64,
    branch: String,
    #[serde(default)]
    current_revision: Option<String>,
    #[serde(default)]
    revisions: HashMap<String, RevisionJson>,
    #[serde(default)]
    labels: HashMap<String, LabelInfo>,
}

#[derive(Debug, Deserialize)]
struct RevisionJson {
    #[serde(rename = "_number")]
    number: u32,
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    #[serde(default)]
    all: Vec<ApprovalInfo>,
}

#[derive(Debug, Deserialize)]
struct ApprovalInfo {
    #[serde(default)]
    value: Option<i32>,
}

impl From<ChangeInfo> for ChangeMetadata {
    fn from(info: ChangeInfo) -> Self {
        let revisions: HashMap<String, RevisionInfo> = info
            .revisions
            .into_iter()
            .map(|(hash, rev)| {
                (
                    hash,
                    RevisionInfo {
                        git_ref: rev.git_ref,
                        patchset: rev.number,
                    },
                )
            })
            .collect();

        // current_revision is omitted by some servers; fall back to the
        // highest patchset
        let current_revision = info
            .current_revision
            .filter(|h| !h.is_empty())
            .or_else(|| {
                revisions
                    .iter()
                    .max_by_key(|(_, r)| r.patchset)
                    .map(|(h, _)| h.clone())
            })
            .unwrap_or_default();

        let approvals = info
            .labels
            .into_iter()
            .map(|(label, li)| {
                let votes = li
                    .all
                    .into_iter()
                    .filter_map(|a| a.value.map(|value| Vote { value }))
                    .collect();
                (label, votes)
            })
            .collect();

        ChangeMetadata {
            number: info.number,
            target_branch: info.branch,
            current_revision,
            revisions,
            approvals,
        }
    }
}

/// Decode a `GET /changes/<id>` body.
pub fn parse_change_response(body: &str) -> Result<ChangeMetadata> {
    let json = body.trim_start().strip_prefix(XSSI_PREFIX).unwrap_or(body);
    let info: ChangeInfo = serde_json::from_str(json)?;
    Ok(info.into())
}

/// Escape a change identifier for use as one path segment.
///
/// `/` becomes `%2F`; `~` and existing `%` escapes pass through.
pub fn escape_change_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'%' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Gerrit REST client. Authenticated (`/a` prefix, basic auth) only when
/// credentials are supplied.
pub struct GerritClient {
    server: String,
    auth: Option<Credentials>,
    http_client: reqwest::Client,
}

impl GerritClient {
    pub fn new(server: &str, auth: Option<Credentials>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cltrigger/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            auth,
            http_client,
        })
    }

    pub fn change_url(&self, change_id: &str) -> String {
        let prefix = if self.auth.is_some() { "/a" } else { "" };
        format!(
            "{}{}/changes/{}?{}",
            self.server,
            prefix,
            escape_change_id(change_id),
            CHANGE_OPTIONS
        )
    }

    async fn fetch_change(&self, change_id: &str) -> Result<(StatusCode, String)> {
        let url = self.change_url(change_id);
        debug!("GET {}", url);
        let mut request = self.http_client.get(&url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl ReviewSystemClient for GerritClient {
    async fn get_change(&self, change_id: &str) -> cltrigger_core::Result<ChangeMetadata> {
        let review_err = |reason: String| TriggerError::Review {
            change: change_id.to_string(),
            reason,
        };

        let (status, body) = self
            .fetch_change(change_id)
            .await
            .map_err(|e| review_err(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(TriggerError::NotFound(change_id.to_string()));
        }
        if !status.is_success() {
            return Err(review_err(format!("status code {}: {}", status.as_u16(), body.trim())));
        }

        parse_change_response(&body).map_err(|e| review_err(e.to_string()))
    }
}
