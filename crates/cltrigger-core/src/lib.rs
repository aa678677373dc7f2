//! cltrigger core library
//!
//! Resolves which Gerrit changes to build from command-line arguments or the
//! local pending commits, then fans trigger requests out to CI repositories.

pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod git;
pub mod policy;
pub mod ports;
pub mod resolve;
pub mod telemetry;
pub mod trailer;

pub use dispatch::{DispatchCoordinator, ErrorList};
pub use domain::{
    ChangeMetadata, Commit, DispatchEvent, DispatchTarget, Revision, RevisionInfo, TriggerKind,
    TriggerPayload, UnityPayload, Vote,
};
pub use error::{AggregateError, Result, TriggerError};
pub use git::{show_toplevel, GitHistoryReader};
pub use policy::{TriggerPolicy, DEFAULT_APPROVED_VALUE, DEFAULT_RESULT_LABEL};
pub use ports::{CommitHistoryReader, DispatchSink, ReviewSystemClient};
pub use resolve::{ChangeResolver, HEAD};
pub use telemetry::init_tracing;
pub use trailer::{change_id_from_message, compound_change_id, CHANGE_ID_TRAILER};
