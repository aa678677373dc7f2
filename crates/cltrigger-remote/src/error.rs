//! Error types for cltrigger-remote

use cltrigger_core::TriggerError;
use thiserror::Error;

/// Errors that can occur loading configuration or talking to remote services
#[derive(Error, Debug)]
pub enum RemoteError {
    /// codereview.cfg could not be read
    #[error("failed to load config from {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    /// codereview.cfg line without a `key: value` shape
    #[error("bad config line in {path}; expected 'key: value': {line:?}")]
    ConfigLine { path: String, line: String },

    /// Required codereview.cfg entry absent
    #[error("missing {0} entry in codereview config")]
    MissingKey(String),

    /// URL that cannot be used for the purpose it was configured for
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Neither the credential helper nor the environment supplied credentials
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// `git credential fill` failed or produced unexpected output
    #[error("credential helper failed: {0}")]
    CredentialHelper(String),

    /// Invalid value in an environment override
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local git failure while locating the work tree
    #[error(transparent)]
    Core(#[from] TriggerError),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err.to_string())
    }
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_line_error_display() {
        let err = RemoteError::ConfigLine {
            path: "/repo/codereview.cfg".to_string(),
            line: "nonsense".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/repo/codereview.cfg"));
        assert!(msg.contains("\"nonsense\""));
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: RemoteError = TriggerError::Git("not a repository".to_string()).into();
        assert_eq!(err.to_string(), "git error: not a repository");
    }
}
