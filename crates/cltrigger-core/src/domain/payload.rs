use serde::{Deserialize, Serialize};

use super::change::{ChangeMetadata, RevisionInfo};

/// Which downstream workflow a trigger selects.
///
/// The serialized names are matched by the receiving CI workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Build verification of the change in its own repository.
    Trybot,
    /// Cross-project compatibility test.
    Unity,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Trybot => "trybot",
            TriggerKind::Unity => "unity",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a trigger request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    #[serde(rename = "CL")]
    pub cl: u64,
    pub patchset: u32,
    #[serde(rename = "targetBranch")]
    pub target_branch: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl TriggerPayload {
    pub fn new(kind: TriggerKind, meta: &ChangeMetadata, info: &RevisionInfo) -> Self {
        Self {
            kind,
            cl: meta.number,
            patchset: info.patchset,
            target_branch: meta.target_branch.clone(),
            git_ref: info.git_ref.clone(),
        }
    }
}

/// Body of a unity trigger.
///
/// `versions` is a space-separated list of double-quoted versions, e.g.
/// `"v0.3.0-beta.5" "v0.3.0-beta.4"`. A run for a change quotes its ref and
/// also carries the change in `cl`; a plain version run sends `cl: null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnityPayload {
    pub cl: Option<TriggerPayload>,
    pub versions: String,
}

impl UnityPayload {
    /// Test the ref of a change.
    pub fn for_change(cl: TriggerPayload) -> Self {
        Self {
            versions: quote_version(&cl.git_ref),
            cl: Some(cl),
        }
    }

    /// Test released versions, without a change.
    pub fn for_versions<S: AsRef<str>>(versions: &[S]) -> Self {
        let quoted: Vec<String> = versions.iter().map(|v| quote_version(v.as_ref())).collect();
        Self {
            cl: None,
            versions: quoted.join(" "),
        }
    }
}

/// Double-quote `version`, escaping quotes, backslashes and control
/// characters.
pub fn quote_version(version: &str) -> String {
    let mut out = String::with_capacity(version.len() + 2);
    out.push('"');
    for c in version.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// What a dispatch target receives as its client payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DispatchEvent {
    Trybot(TriggerPayload),
    Unity(UnityPayload),
}

impl DispatchEvent {
    /// The event for one revision of a change, shaped for `kind`.
    pub fn for_change(kind: TriggerKind, meta: &ChangeMetadata, info: &RevisionInfo) -> Self {
        let payload = TriggerPayload::new(kind, meta, info);
        match kind {
            TriggerKind::Trybot => DispatchEvent::Trybot(payload),
            TriggerKind::Unity => DispatchEvent::Unity(UnityPayload::for_change(payload)),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            DispatchEvent::Trybot(_) => TriggerKind::Trybot,
            DispatchEvent::Unity(_) => TriggerKind::Unity,
        }
    }

    /// The change this event is about, if any.
    pub fn change(&self) -> Option<&TriggerPayload> {
        match self {
            DispatchEvent::Trybot(p) => Some(p),
            DispatchEvent::Unity(u) => u.cl.as_ref(),
        }
    }
}

/// A repository that receives triggers of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchTarget {
    pub owner: String,
    pub repo: String,
    pub kind: TriggerKind,
}

impl DispatchTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            kind,
        }
    }
}

impl std::fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_field_names() {
        let payload = TriggerPayload {
            kind: TriggerKind::Trybot,
            cl: 12345,
            patchset: 42,
            target_branch: "master".to_string(),
            git_ref: "refs/changes/52/551352/140".to_string(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "trybot",
                "CL": 12345,
                "patchset": 42,
                "targetBranch": "master",
                "ref": "refs/changes/52/551352/140"
            })
        );
    }

    #[test]
    fn test_kind_display_matches_serialized_name() {
        for kind in [TriggerKind::Trybot, TriggerKind::Unity] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    fn meta_and_revision() -> (ChangeMetadata, RevisionInfo) {
        let info = RevisionInfo {
            git_ref: "refs/changes/25/551325/14".to_string(),
            patchset: 24,
        };
        let meta = ChangeMetadata {
            number: 54321,
            target_branch: "master".to_string(),
            current_revision: "abc".to_string(),
            ..ChangeMetadata::default()
        };
        (meta, info)
    }

    #[test]
    fn test_unity_event_for_change_json() {
        let (meta, info) = meta_and_revision();
        let event = DispatchEvent::for_change(TriggerKind::Unity, &meta, &info);
        assert_eq!(event.kind(), TriggerKind::Unity);
        assert_eq!(event.change().map(|p| p.cl), Some(54321));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "cl": {
                    "type": "unity",
                    "CL": 54321,
                    "patchset": 24,
                    "targetBranch": "master",
                    "ref": "refs/changes/25/551325/14"
                },
                "versions": "\"refs/changes/25/551325/14\""
            })
        );
    }

    #[test]
    fn test_unity_event_for_versions_json() {
        let event = DispatchEvent::Unity(UnityPayload::for_versions(&["v0.3.0-beta.5"]));
        assert!(event.change().is_none());
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"cl":null,"versions":"\"v0.3.0-beta.5\""}"#
        );
    }

    #[test]
    fn test_trybot_event_is_bare_payload() {
        let (meta, info) = meta_and_revision();
        let event = DispatchEvent::for_change(TriggerKind::Trybot, &meta, &info);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "trybot");
        assert_eq!(value["CL"], 54321);
        assert!(value.get("versions").is_none());
    }

    #[test]
    fn test_quote_version() {
        assert_eq!(quote_version("v0.4.0"), "\"v0.4.0\"");
        assert_eq!(quote_version("a\"b\\c"), r#""a\"b\\c""#);
        assert_eq!(quote_version("a\nb"), r#""a\nb""#);
        let many = UnityPayload::for_versions(&["v0.3.0-beta.5", "v0.3.0-beta.4"]);
        assert_eq!(many.versions, r#""v0.3.0-beta.5" "v0.3.0-beta.4""#);
    }

    #[test]
    fn test_target_display() {
        let target = DispatchTarget::new("cue-lang", "cue", TriggerKind::Trybot);
        assert_eq!(target.to_string(), "cue-lang/cue");
    }
}
