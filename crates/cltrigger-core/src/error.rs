//! Error taxonomy for change resolution and trigger dispatch.

use std::fmt;

/// Errors produced while resolving changes or dispatching triggers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    /// Malformed or contradictory input. Raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// An argument could not be matched to a pending commit.
    #[error("failed to resolve {arg:?}: {reason}")]
    Lookup { arg: String, reason: String },

    /// The review system has no record of the change.
    #[error("change {0} not found")]
    NotFound(String),

    /// The change exists but does not carry the requested revision.
    #[error("change {change} does not know about revision {revision}; did you forget to mail it?")]
    UnknownRevision { change: String, revision: String },

    /// Any other failure talking to the review system.
    #[error("failed to get change {change}: {reason}")]
    Review { change: String, reason: String },

    /// The dispatch sink rejected or failed to deliver a trigger.
    #[error("failed to dispatch {kind} to {target}: {reason}")]
    Delivery {
        kind: String,
        target: String,
        reason: String,
    },

    /// The local git history could not be read.
    #[error("git error: {0}")]
    Git(String),

    /// A per-revision dispatch task panicked or was cancelled.
    #[error("trigger task for {revision} failed: {reason}")]
    TaskFailed { revision: String, reason: String },
}

impl TriggerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TriggerError::Validation(msg.into())
    }

    pub fn lookup(arg: impl Into<String>, reason: impl Into<String>) -> Self {
        TriggerError::Lookup {
            arg: arg.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for resolution and dispatch operations.
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Every per-revision failure collected during one dispatch call.
///
/// The display form is the newline-joined messages of the individual errors,
/// in the order they were recorded (which is not deterministic across runs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateError {
    errors: Vec<TriggerError>,
}

impl AggregateError {
    pub fn new(errors: Vec<TriggerError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[TriggerError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_names_argument() {
        let err = TriggerError::lookup("deadbeef", "not a pending commit");
        let msg = err.to_string();
        assert!(msg.contains("deadbeef"));
        assert!(msg.contains("not a pending commit"));
    }

    #[test]
    fn test_unknown_revision_hints_at_mail() {
        let err = TriggerError::UnknownRevision {
            change: "1234".to_string(),
            revision: "abc".to_string(),
        };
        assert!(err.to_string().contains("did you forget to mail it?"));
    }

    #[test]
    fn test_aggregate_error_joins_with_newlines() {
        let err = AggregateError::new(vec![
            TriggerError::NotFound("1".to_string()),
            TriggerError::NotFound("2".to_string()),
        ]);
        assert_eq!(err.to_string(), "change 1 not found\nchange 2 not found");
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn test_aggregate_error_single_entry_has_no_trailing_newline() {
        let err = AggregateError::new(vec![TriggerError::validation("boom")]);
        assert_eq!(err.to_string(), "boom");
    }
}
