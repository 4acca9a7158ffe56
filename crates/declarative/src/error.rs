//! Reconciliation errors

use serde_json::Value;
use std::time::Duration;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by [`Error::Adapter`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while reconciling a resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mandatory input is missing or inconsistent.
    #[error("{0}")]
    Configuration(String),

    /// A lookup matched more than one resource.
    #[error("{kind} lookup for '{key}' matched {count} resources")]
    Ambiguous {
        /// Resource kind.
        kind: &'static str,
        /// Id or name used for the lookup.
        key: String,
        /// Number of matches.
        count: usize,
    },

    /// A lookup returned something that is not a resource.
    #[error("malformed {kind} representation: {reason}")]
    Malformed {
        /// Resource kind.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The resource must exist for the requested operation.
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Resource kind.
        kind: &'static str,
        /// Id or name used for the lookup.
        key: String,
    },

    /// An awaited task finished in a failure state.
    #[error("{operation} failed: {message}")]
    TaskFailed {
        /// Operation that started the task.
        operation: String,
        /// Task message.
        message: String,
        /// Resolved task payload.
        response: Value,
    },

    /// The poll bound was exceeded.
    #[error("task did not finish after {attempts} polls ({elapsed:?})")]
    Timeout {
        /// Number of polls performed.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// Polling was cancelled.
    #[error("task polling cancelled")]
    Cancelled,

    /// A non-terminal task carried neither `task_uri` nor `taskUri`.
    #[error("task has no locator (task_uri / taskUri)")]
    MissingTaskLocator,

    /// A task descriptor could not be decoded.
    #[error("malformed task: {0}")]
    MalformedTask(String),

    /// The resource type does not offer the operation.
    #[error("{kind} does not support '{operation}'")]
    Unsupported {
        /// Resource kind.
        kind: &'static str,
        /// Requested operation.
        operation: String,
    },

    /// A call through the resource adapter failed.
    #[error("{operation} failed")]
    Adapter {
        /// What was being attempted.
        operation: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Wrap an adapter failure.
    pub fn adapter(operation: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Adapter {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Whether the failure happened before any remote mutation was attempted.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Unsupported { .. })
    }
}
