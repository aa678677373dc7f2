//! Concurrent trigger fan-out.
//!
//! One tokio task per revision. Each task looks the change up, applies the
//! [`TriggerPolicy`], and delivers a payload to every configured target.
//! Failures are isolated per revision and collected in an [`ErrorList`];
//! all tasks run to completion before the combined result is reported.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{DispatchEvent, DispatchTarget, Revision};
use crate::error::{AggregateError, Result, TriggerError};
use crate::policy::TriggerPolicy;
use crate::ports::{DispatchSink, ReviewSystemClient};

/// Append-only error collector shared by the tasks of one dispatch call.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Mutex<Vec<TriggerError>>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, err: TriggerError) {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(err);
    }

    pub fn len(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the recorded errors. `Ok(())` when nothing was recorded.
    pub fn finish(&self) -> std::result::Result<(), AggregateError> {
        let errors = std::mem::take(
            &mut *self
                .errors
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AggregateError::new(errors))
        }
    }
}

/// What happened to one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Skipped,
    Delivered,
    Failed,
}

/// Fans trigger requests out over a set of revisions.
pub struct DispatchCoordinator {
    review: Arc<dyn ReviewSystemClient>,
    policy: Arc<TriggerPolicy>,
    targets: Arc<[DispatchTarget]>,
}

impl DispatchCoordinator {
    /// Create a coordinator delivering to `targets` with the default policy.
    pub fn new(review: Arc<dyn ReviewSystemClient>, targets: Vec<DispatchTarget>) -> Self {
        Self {
            review,
            policy: Arc::new(TriggerPolicy::default()),
            targets: targets.into(),
        }
    }

    pub fn with_policy(mut self, policy: TriggerPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Trigger every revision concurrently.
    ///
    /// Never stops early: a failing revision does not affect the others. The
    /// error, if any, lists every failure once all tasks have finished.
    pub async fn dispatch(
        &self,
        revisions: &[Revision],
        force: bool,
        sink: Arc<dyn DispatchSink>,
    ) -> std::result::Result<(), AggregateError> {
        info!(
            "Dispatching {} revision(s) to {} target(s)",
            revisions.len(),
            self.targets.len()
        );

        let errors = Arc::new(ErrorList::new());
        let mut tasks: Vec<(Revision, JoinHandle<TaskOutcome>)> = Vec::new();

        for rev in revisions {
            let review = Arc::clone(&self.review);
            let policy = Arc::clone(&self.policy);
            let targets = Arc::clone(&self.targets);
            let sink = Arc::clone(&sink);
            let errors_clone = Arc::clone(&errors);
            let task_rev = rev.clone();

            let task = tokio::spawn(async move {
                match trigger_revision(
                    review.as_ref(),
                    &policy,
                    &targets,
                    sink.as_ref(),
                    &task_rev,
                    force,
                    &errors_clone,
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!("{}: {}", task_rev, err);
                        errors_clone.add(err);
                        TaskOutcome::Failed
                    }
                }
            });
            tasks.push((rev.clone(), task));
        }

        let (revs, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let mut delivered = 0;
        let mut skipped = 0;
        for (rev, joined) in revs.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(TaskOutcome::Delivered) => delivered += 1,
                Ok(TaskOutcome::Skipped) => skipped += 1,
                Ok(TaskOutcome::Failed) => {}
                Err(join_err) => errors.add(TriggerError::TaskFailed {
                    revision: rev.to_string(),
                    reason: join_err.to_string(),
                }),
            }
        }

        info!(
            "Triggered {} revision(s), skipped {}, {} error(s)",
            delivered,
            skipped,
            errors.len()
        );

        errors.finish()
    }
}

/// Look up, check policy and deliver one revision. Lookup failures end the
/// task through the returned error; delivery failures are recorded per target
/// so the other targets are still attempted.
async fn trigger_revision(
    review: &dyn ReviewSystemClient,
    policy: &TriggerPolicy,
    targets: &[DispatchTarget],
    sink: &dyn DispatchSink,
    rev: &Revision,
    force: bool,
    errors: &ErrorList,
) -> Result<TaskOutcome> {
    let meta = review.get_change(&rev.change_id).await?;

    let hash = meta.resolve_revision(&rev.revision);
    let info = meta
        .revisions
        .get(hash)
        .ok_or_else(|| TriggerError::UnknownRevision {
            change: rev.change_id.clone(),
            revision: hash.to_string(),
        })?;

    if !policy.should_trigger(&meta, &rev.revision, force) {
        info!(
            "Skipping change {} patchset {}: {} already approved (use --force to rerun)",
            meta.number, info.patchset, policy.label
        );
        return Ok(TaskOutcome::Skipped);
    }

    let mut failed = false;
    for target in targets {
        let event = DispatchEvent::for_change(target.kind, &meta, info);
        debug!(
            "Delivering {} for change {} ({}) to {}",
            target.kind, meta.number, info.git_ref, target
        );
        if let Err(err) = sink.deliver(&target.owner, &target.repo, &event).await {
            let err = match err {
                e @ TriggerError::Delivery { .. } => e,
                other => TriggerError::Delivery {
                    kind: target.kind.to_string(),
                    target: target.to_string(),
                    reason: other.to_string(),
                },
            };
            warn!("{}: {}", rev, err);
            errors.add(err);
            failed = true;
        }
    }

    Ok(if failed {
        TaskOutcome::Failed
    } else {
        TaskOutcome::Delivered
    })
}
