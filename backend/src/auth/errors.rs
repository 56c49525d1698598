//! Custom error types specific to authentication failures.
//!
//! This module defines the errors each authentication component can return.
//! Every expected failure is a value here; nothing on these paths panics.
//! Variants that end up in front of a client are deliberately coarse so
//! responses do not reveal which check failed.

use adapters::DirectoryError;
use thiserror::Error;

/// Failures of the credential hasher.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Password exceeds the maximum accepted length")]
    TooLong,

    #[error("Invalid hashing parameters: {0}")]
    Params(String),

    #[error("Hashing failed: {0}")]
    Algorithm(String),

    #[error("Hashing timed out")]
    Timeout,

    #[error("Hashing worker failed: {0}")]
    Worker(String),
}

/// Failures while issuing or validating an activation token.
#[derive(Debug, Error)]
pub enum ActivationTokenError {
    #[error("Activation token not found")]
    NotFound,

    #[error("Activation token expired")]
    Expired,

    #[error("Activation token already consumed")]
    AlreadyConsumed,

    #[error("Activation token lifetime out of range")]
    TtlOutOfRange,

    #[error("Activation token storage error: {0}")]
    Storage(#[from] DirectoryError),
}

/// Failures while issuing or verifying an identity (bearer) token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityTokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("User already exists")]
    DuplicateUser,

    #[error("Registration failed: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Invalid or expired activation token")]
    InvalidOrExpiredToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Activation failed: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account not activated")]
    NotActivated,

    #[error("Login failed: {0}")]
    Internal(String),
}
