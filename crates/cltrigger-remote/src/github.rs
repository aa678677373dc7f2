//! GitHub `repository_dispatch` sinks

use std::time::Duration;

use async_trait::async_trait;
use cltrigger_core::{DispatchEvent, DispatchSink, TriggerError};
use serde::Serialize;
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::error::Result;

/// Body of `POST /repos/{owner}/{repo}/dispatches`.
#[derive(Debug, Serialize)]
pub struct DispatchRequest<'a> {
    pub event_type: &'a str,
    pub client_payload: &'a DispatchEvent,
}

impl<'a> DispatchRequest<'a> {
    pub fn new(event: &'a DispatchEvent) -> Self {
        Self {
            event_type: event.kind().as_str(),
            client_payload: event,
        }
    }
}

/// `CL 1234 patchset 5` for change events, `versions "v0.4.0"` otherwise.
fn describe(event: &DispatchEvent) -> String {
    match (event.change(), event) {
        (Some(p), _) => format!("CL {} patchset {}", p.cl, p.patchset),
        (None, DispatchEvent::Unity(u)) => format!("versions {}", u.versions),
        (None, DispatchEvent::Trybot(_)) => String::new(),
    }
}

/// Delivers triggers as GitHub repository dispatch events.
pub struct GitHubDispatcher {
    api_url: String,
    auth: Credentials,
    http_client: reqwest::Client,
}

impl GitHubDispatcher {
    pub fn new(api_url: &str, auth: Credentials, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("cltrigger/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth,
            http_client,
        })
    }

    pub fn dispatch_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/dispatches", self.api_url, owner, repo)
    }
}

#[async_trait]
impl DispatchSink for GitHubDispatcher {
    async fn deliver(
        &self,
        owner: &str,
        repo: &str,
        event: &DispatchEvent,
    ) -> cltrigger_core::Result<()> {
        let delivery_err = |reason: String| TriggerError::Delivery {
            kind: event.kind().to_string(),
            target: format!("{owner}/{repo}"),
            reason,
        };

        let url = self.dispatch_url(owner, repo);
        debug!("POST {} ({} {})", url, event.kind(), describe(event));
        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.auth.username, Some(&self.auth.password))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&DispatchRequest::new(event))
            .send()
            .await
            .map_err(|e| delivery_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(delivery_err(format!(
                "status code {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        info!(
            "Dispatched {} for {} to {}/{}",
            event.kind(),
            describe(event),
            owner,
            repo
        );
        Ok(())
    }
}

/// Logs the request that would be sent and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl DispatchSink for DryRunSink {
    async fn deliver(
        &self,
        owner: &str,
        repo: &str,
        event: &DispatchEvent,
    ) -> cltrigger_core::Result<()> {
        let body = serde_json::to_string(&DispatchRequest::new(event)).map_err(|e| {
            TriggerError::Delivery {
                kind: event.kind().to_string(),
                target: format!("{owner}/{repo}"),
                reason: e.to_string(),
            }
        })?;
        info!("dry run: would dispatch to {}/{}: {}", owner, repo, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cltrigger_core::{TriggerKind, TriggerPayload, UnityPayload};

    fn trybot() -> DispatchEvent {
        DispatchEvent::Trybot(TriggerPayload {
            kind: TriggerKind::Trybot,
            cl: 551352,
            patchset: 140,
            target_branch: "master".to_string(),
            git_ref: "refs/changes/52/551352/140".to_string(),
        })
    }

    #[test]
    fn test_trybot_request_body() {
        let event = trybot();
        let value = serde_json::to_value(DispatchRequest::new(&event)).unwrap();
        assert_eq!(value["event_type"], "trybot");
        assert_eq!(value["client_payload"]["CL"], 551352);
        assert_eq!(value["client_payload"]["ref"], "refs/changes/52/551352/140");
        assert_eq!(value["client_payload"]["targetBranch"], "master");
    }

    #[test]
    fn test_unity_versions_request_body() {
        let event = DispatchEvent::Unity(UnityPayload::for_versions(&["v0.4.0", "v0.3.2"]));
        let value = serde_json::to_value(DispatchRequest::new(&event)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "event_type": "unity",
                "client_payload": {"cl": null, "versions": "\"v0.4.0\" \"v0.3.2\""}
            })
        );
    }

    #[test]
    fn test_describe_event() {
        assert_eq!(describe(&trybot()), "CL 551352 patchset 140");
        let versions = DispatchEvent::Unity(UnityPayload::for_versions(&["v0.4.0"]));
        assert_eq!(describe(&versions), "versions \"v0.4.0\"");
    }

    #[test]
    fn test_dispatch_url() {
        let d = GitHubDispatcher::new(
            "https://api.github.com/",
            Credentials::new("u", "t"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            d.dispatch_url("cue-lang", "cue"),
            "https://api.github.com/repos/cue-lang/cue/dispatches"
        );
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        DryRunSink.deliver("o", "r", &trybot()).await.unwrap();
    }
}
