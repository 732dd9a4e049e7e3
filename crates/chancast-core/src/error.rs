//! ChanCast error taxonomy.
//!
//! One enum for the whole workspace. Item-level failures recorded on a task
//! row and caller-visible creation failures both travel through this type;
//! the gateway maps variants to HTTP status codes.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, ChanCastError>;

#[derive(Debug, Error)]
pub enum ChanCastError {
    /// Session key absent from the registry.
    #[error("session '{0}' is not connected")]
    NotConnected(String),

    /// Remote login was rejected for the session.
    #[error("session '{0}' failed authorization")]
    AuthorizationFailed(String),

    /// Duplicate account/session/channel.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Cross-owner access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Missing task/schedule/channel/account.
    #[error("not found: {0}")]
    NotFound(String),

    /// Per-account channel-creation ceiling reached.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Task is already RUNNING.
    #[error("task {0} is already running")]
    DuplicateRunning(i64),

    /// Unknown task/schedule kind.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// SQLite-level failure.
    #[error("database error: {0}")]
    Database(String),

    /// Remote bridge / HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Config file read/parse/serialize failure.
    #[error("config error: {0}")]
    Config(String),

    /// Scheduler/expander failure (bad trigger, impossible time window).
    #[error("schedule error: {0}")]
    Schedule(String),

    /// Invalid caller-supplied payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Queue/worker infrastructure fault, distinct from any single item.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ChanCastError {
    fn from(err: serde_json::Error) -> Self {
        ChanCastError::InvalidArgument(format!("bad payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ChanCastError::NotConnected("acct1".into());
        assert_eq!(err.to_string(), "session 'acct1' is not connected");

        let err = ChanCastError::DuplicateRunning(7);
        assert_eq!(err.to_string(), "task 7 is already running");
    }
}
