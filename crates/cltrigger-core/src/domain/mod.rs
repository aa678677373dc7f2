//! Domain models for cltrigger.
//!
//! Canonical definitions for the core entities:
//! - `Commit`: A local commit read from git history
//! - `Revision`: A (change, revision) pair to trigger
//! - `ChangeMetadata`: Review-system view of a change
//! - `TriggerPayload`, `UnityPayload`: What gets sent to a CI repository

pub mod change;
pub mod payload;
pub mod revision;

pub use change::{ChangeMetadata, RevisionInfo, Vote};
pub use payload::{
    quote_version, DispatchEvent, DispatchTarget, TriggerKind, TriggerPayload, UnityPayload,
};
pub use revision::{short_hash, Commit, Revision};
