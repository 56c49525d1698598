//! Custom error types specific to the `adapters` crate.
//!
//! These cover failures while talking to the user directory or delivering
//! notifications. The core maps all of them except `Conflict` to an internal
//! error; none of them are shown to clients verbatim.

use thiserror::Error;

/// Errors raised by a [`UserDirectory`](crate::UserDirectory).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A uniqueness constraint (email or username) rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The record targeted by a mutation does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store failed (connection, query, corrupt row).
    #[error("Directory backend error: {0}")]
    Backend(String),
}

/// Errors raised by a [`NotificationSender`](crate::NotificationSender).
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier misconfigured: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
