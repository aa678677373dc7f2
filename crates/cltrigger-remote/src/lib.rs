//! cltrigger remote services
//!
//! Gerrit and GitHub implementations of the cltrigger-core ports, plus
//! `codereview.cfg` and credential loading.

pub mod config;
pub mod credentials;
pub mod error;
pub mod gerrit;
pub mod github;

pub use config::{GitHubRepo, Settings, CONFIG_FILE, DEFAULT_GITHUB_API, DEFAULT_HTTP_TIMEOUT};
pub use credentials::Credentials;
pub use error::{RemoteError, Result};
pub use gerrit::GerritClient;
pub use github::{DispatchRequest, DryRunSink, GitHubDispatcher};
