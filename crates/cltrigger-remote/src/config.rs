//! Project configuration
//!
//! Reads `codereview.cfg` from the top of the work tree and the environment
//! overrides, and discovers credentials for Gerrit and GitHub.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cltrigger_core::{show_toplevel, DispatchTarget, TriggerKind};
use reqwest::Url;
use tracing::debug;

use crate::credentials::{self, Credentials};
use crate::error::{RemoteError, Result};

/// Name of the config file at the top of the work tree.
pub const CONFIG_FILE: &str = "codereview.cfg";

/// Keys naming the unity repository, most preferred first.
pub const UNITY_KEYS: [&str; 2] = ["cue-unity-new", "cue-unity"];

/// GitHub REST API base used when `CLTRIGGER_GITHUB_API` is unset.
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// HTTP request timeout used when `CLTRIGGER_HTTP_TIMEOUT_SECS` is unset.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse `codereview.cfg` text: `key: value` lines, `#` comments.
pub fn parse_codereview_cfg(text: &str, path: &str) -> Result<HashMap<String, String>> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| RemoteError::ConfigLine {
            path: path.to_string(),
            line: line.to_string(),
        })?;
        entries.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(entries)
}

/// Gerrit server root: the configured URL with its path, query and fragment
/// removed.
pub fn gerrit_server(url: &str) -> Result<String> {
    let mut parsed = parse_url(url)?;
    parsed.set_path("");
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// A GitHub repository addressed by owner and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    /// Split `https://github.com/<owner>/<repo>` into its parts.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = parse_url(url)?;
        let parts: Vec<&str> = parsed
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        match parts.as_slice() {
            [owner, repo] => Ok(Self {
                owner: owner.to_string(),
                repo: repo.trim_end_matches(".git").to_string(),
            }),
            _ => Err(RemoteError::InvalidUrl {
                url: url.to_string(),
                reason: "expected https://github.com/<owner>/<repo>".to_string(),
            }),
        }
    }

    pub fn target(&self, kind: TriggerKind) -> DispatchTarget {
        DispatchTarget::new(&self.owner, &self.repo, kind)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| RemoteError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.host_str().is_none() {
        return Err(RemoteError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        });
    }
    Ok(parsed)
}

/// Everything the CLI needs to talk to Gerrit and GitHub.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Work tree root holding `codereview.cfg`.
    pub root: PathBuf,
    pub gerrit_url: String,
    pub gerrit_server: String,
    pub github: GitHubRepo,
    /// Compatibility-test repository, if configured.
    pub unity: Option<GitHubRepo>,
    /// Branch compared against when the current branch has no upstream.
    pub default_branch: Option<String>,
    pub github_api: String,
    pub http_timeout: Duration,
    pub github_auth: Option<Credentials>,
    pub gerrit_auth: Option<Credentials>,
}

impl Settings {
    /// Build settings from parsed `codereview.cfg` entries and the
    /// environment. Credentials are not looked up here.
    pub fn from_entries(root: PathBuf, entries: &HashMap<String, String>) -> Result<Self> {
        let gerrit_url = required(entries, "gerrit")?;
        let github_url = required(entries, "github")?;
        let unity = UNITY_KEYS
            .iter()
            .find_map(|key| entries.get(*key).filter(|v| !v.is_empty()))
            .map(|url| GitHubRepo::parse(url))
            .transpose()?;

        Ok(Self {
            root,
            gerrit_server: gerrit_server(&gerrit_url)?,
            gerrit_url,
            github: GitHubRepo::parse(&github_url)?,
            unity,
            default_branch: entries.get("branch").filter(|v| !v.is_empty()).cloned(),
            github_api: std::env::var("CLTRIGGER_GITHUB_API")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_timeout: http_timeout_from_env()?,
            github_auth: None,
            gerrit_auth: None,
        })
    }

    /// Load `codereview.cfg` from the work tree containing `dir` and discover
    /// credentials.
    pub fn load(dir: &Path) -> Result<Self> {
        let root = show_toplevel(dir)?;
        let path = root.join(CONFIG_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| RemoteError::ConfigLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let entries = parse_codereview_cfg(&text, &path.display().to_string())?;
        debug!("Loaded {} entries from {}", entries.len(), path.display());

        let mut settings = Self::from_entries(root, &entries)?;
        settings.github_auth = credentials::discover(
            &format!("https://github.com/{}/{}", settings.github.owner, settings.github.repo),
            "GITHUB_USER",
            "GITHUB_PAT",
        );
        settings.gerrit_auth =
            credentials::discover(&settings.gerrit_url, "GERRIT_USER", "GERRIT_PASSWORD");
        if settings.gerrit_auth.is_none() {
            debug!("No Gerrit credentials; using anonymous REST access");
        }
        Ok(settings)
    }

    /// GitHub credentials, which dispatching requires.
    pub fn require_github_auth(&self) -> Result<&Credentials> {
        self.github_auth.as_ref().ok_or_else(|| {
            RemoteError::MissingCredentials(
                "no GitHub credentials from git credential helper or GITHUB_USER/GITHUB_PAT"
                    .to_string(),
            )
        })
    }

    /// Dispatch targets: the main repository, plus the unity repository when
    /// configured and requested.
    pub fn targets(&self, include_unity: bool) -> Vec<DispatchTarget> {
        let mut targets = vec![self.github.target(TriggerKind::Trybot)];
        if include_unity {
            if let Some(unity) = &self.unity {
                targets.push(unity.target(TriggerKind::Unity));
            }
        }
        targets
    }
}

fn required(entries: &HashMap<String, String>, key: &str) -> Result<String> {
    entries
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| RemoteError::MissingKey(key.to_string()))
}

fn http_timeout_from_env() -> Result<Duration> {
    match std::env::var("CLTRIGGER_HTTP_TIMEOUT_SECS") {
        Ok(v) if !v.is_empty() => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| RemoteError::InvalidEnv {
                var: "CLTRIGGER_HTTP_TIMEOUT_SECS".to_string(),
                reason: e.to_string(),
            }),
        _ => Ok(DEFAULT_HTTP_TIMEOUT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(text: &str) -> HashMap<String, String> {
        parse_codereview_cfg(text, "codereview.cfg").unwrap()
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let e = entries(
            "# project config\n\ngerrit: https://review.gerrithub.io/a/cue-lang/cue\ngithub: https://github.com/cue-lang/cue\n",
        );
        assert_eq!(e.len(), 2);
        assert_eq!(e["github"], "https://github.com/cue-lang/cue");
        // only the first colon separates key from value
        assert_eq!(e["gerrit"], "https://review.gerrithub.io/a/cue-lang/cue");
    }

    #[test]
    fn test_parse_rejects_line_without_colon() {
        let err = parse_codereview_cfg("gerrit\n", "codereview.cfg").unwrap_err();
        assert!(matches!(err, RemoteError::ConfigLine { .. }));
    }

    #[test]
    fn test_parse_splits_at_first_colon_even_inside_url() {
        let e = entries("gerrit https://x\n");
        assert_eq!(e["gerrit https"], "//x");
        assert!(!e.contains_key("gerrit"));
    }

    #[test]
    fn test_gerrit_server_strips_path() {
        assert_eq!(
            gerrit_server("https://review.gerrithub.io/a/cue-lang/cue").unwrap(),
            "https://review.gerrithub.io"
        );
        assert_eq!(
            gerrit_server("http://localhost:8080/").unwrap(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_github_repo_parse() {
        let repo = GitHubRepo::parse("https://github.com/cue-lang/cue").unwrap();
        assert_eq!(repo.owner, "cue-lang");
        assert_eq!(repo.repo, "cue");
        let repo = GitHubRepo::parse("https://github.com/cue-unity/unity.git/").unwrap();
        assert_eq!(repo.repo, "unity");
    }

    #[test]
    fn test_github_repo_parse_rejects_wrong_shape() {
        assert!(GitHubRepo::parse("https://github.com/cue-lang").is_err());
        assert!(GitHubRepo::parse("https://github.com/a/b/c").is_err());
        assert!(GitHubRepo::parse("cue-lang/cue").is_err());
    }

    #[test]
    fn test_from_entries_requires_gerrit_and_github() {
        let err = Settings::from_entries(
            PathBuf::from("/repo"),
            &entries("github: https://github.com/cue-lang/cue\n"),
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::MissingKey(ref k) if k == "gerrit"));
    }

    #[test]
    fn test_targets_include_unity_only_when_configured_and_requested() {
        let settings = Settings::from_entries(
            PathBuf::from("/repo"),
            &entries(
                "gerrit: https://review.gerrithub.io/a/cue-lang/cue\n\
                 github: https://github.com/cue-lang/cue\n\
                 cue-unity: https://github.com/cue-unity/unity\n\
                 branch: main\n",
            ),
        )
        .unwrap();
        assert_eq!(settings.gerrit_server, "https://review.gerrithub.io");
        assert_eq!(settings.default_branch.as_deref(), Some("main"));

        let all = settings.targets(true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].to_string(), "cue-unity/unity");
        assert_eq!(all[1].kind, TriggerKind::Unity);
        assert_eq!(settings.targets(false).len(), 1);
    }

    #[test]
    fn test_newer_unity_key_takes_precedence() {
        let settings = Settings::from_entries(
            PathBuf::from("/repo"),
            &entries(
                "gerrit: https://review.gerrithub.io\n\
                 github: https://github.com/cue-lang/cue\n\
                 cue-unity: https://github.com/cue-unity/unity\n\
                 cue-unity-new: https://github.com/cue-lang/cue-unity\n",
            ),
        )
        .unwrap();
        assert_eq!(
            settings.unity,
            Some(GitHubRepo {
                owner: "cue-lang".to_string(),
                repo: "cue-unity".to_string(),
            })
        );
    }

    #[test]
    fn test_plain_unity_key_is_not_recognised() {
        let settings = Settings::from_entries(
            PathBuf::from("/repo"),
            &entries(
                "gerrit: https://review.gerrithub.io\n\
                 github: https://github.com/cue-lang/cue\n\
                 unity: https://github.com/cue-unity/unity\n",
            ),
        )
        .unwrap();
        assert!(settings.unity.is_none());
        assert_eq!(settings.targets(true).len(), 1);
    }

    #[test]
    fn test_missing_github_auth_is_an_error() {
        let settings = Settings::from_entries(
            PathBuf::from("/repo"),
            &entries("gerrit: https://g.example\ngithub: https://github.com/o/r\n"),
        )
        .unwrap();
        assert!(matches!(
            settings.require_github_auth(),
            Err(RemoteError::MissingCredentials(_))
        ));
    }
}
