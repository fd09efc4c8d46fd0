//! Typed errors for the synchronization engine.
//!
//! Infrastructure traits return `anyhow::Result`; only the failures the loops
//! must tell apart get their own type:
//!
//! - [`TransportError`] - the remote agent could not be reached. Always retried
//!   through reconnect, never surfaced past a loop.
//! - [`GroupRequestError`] - lookup of a group request. `NotFound` is a benign
//!   terminal case for the router, `Transport` is retried.
//! - [`SyncError`] - what routing a single event can fail with. The event is
//!   left unacknowledged so it is delivered again.

use thiserror::Error;

/// The remote agent was unreachable or timed out.
#[derive(Debug, Clone, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure looking up a group request by its digest.
#[derive(Debug, Clone, Error)]
pub enum GroupRequestError {
    /// The request no longer exists on the agent.
    #[error("group request not found: {digest}")]
    NotFound { digest: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GroupRequestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GroupRequestError::NotFound { .. })
    }
}

/// Errors raised while routing an event or serving inbox operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("group request lookup failed: {0}")]
    GroupLookup(#[source] GroupRequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("local store error: {0}")]
    Store(anyhow::Error),

    #[error("domain action failed: {0}")]
    Action(anyhow::Error),

    #[error("notification record not found: {0}")]
    NotificationNotFound(String),
}

impl From<GroupRequestError> for SyncError {
    fn from(err: GroupRequestError) -> Self {
        match err {
            GroupRequestError::Transport(e) => SyncError::Transport(e),
            other => SyncError::GroupLookup(other),
        }
    }
}

impl SyncError {
    /// Wrap a store failure.
    pub fn store(err: anyhow::Error) -> Self {
        SyncError::Store(err)
    }

    /// Whether retrying the same event later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Store(_) | SyncError::Action(_)
        )
    }
}
