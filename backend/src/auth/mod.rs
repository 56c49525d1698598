//! Authentication module for managing user accounts and access control.
//!
//! This module provides the public interface for user authentication-related
//! functionalities: password hashing, activation tokens, identity tokens,
//! registration, activation, login, and the bearer-token extractor.

pub mod activation;
pub mod errors;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;
pub mod service;

// Re-exports for convenience
pub use activation::{ActivationTokenManager, IssuedActivationToken};
pub use errors::*;
pub use jwt::IdentityTokenIssuer;
pub use middleware::AuthenticatedUser;
pub use models::*;
pub use password::{CredentialHasher, HashParams};
pub use routes::auth_router;
pub use service::{AuthService, AuthSettings};
