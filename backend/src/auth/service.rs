//! Core business logic for the authentication system.
//!
//! This service handles registration, email activation, and login. Each flow
//! is its own orchestrator over the hasher, the activation token manager, the
//! identity token issuer, and the directory and notifier collaborators.
//! Calls to collaborators are bounded by the configured outbound timeout and
//! nothing is retried here; retrying is the caller's decision.

use super::activation::{ActivationTokenManager, IssuedActivationToken};
use super::errors::{
    ActivationError, ActivationTokenError, HashError, LoginError, RegistrationError,
};
use super::jwt::IdentityTokenIssuer;
use super::password::MAX_PASSWORD_BYTES;
use crate::services::HashPool;
use adapters::{DirectoryError, NewUser, NotificationSender, User, UserDirectory};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const MIN_PASSWORD_CHARS: usize = 8;
const MAX_EMAIL_LEN: usize = 254;
const MAX_USERNAME_CHARS: usize = 64;

/// Immutable settings shared by the orchestrators.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Prefix of activation links; the token is appended as a path segment.
    pub activate_base_url: String,
    pub activation_ttl: chrono::Duration,
    pub outbound_timeout: Duration,
}

impl AuthSettings {
    pub fn activation_link(&self, token: &str) -> String {
        format!("{}/{}", self.activate_base_url.trim_end_matches('/'), token)
    }
}

/// Trim and lower-case an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

async fn bounded<T, E, F>(limit: Duration, what: &str, call: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(|e| format!("{}: {}", what, e)),
        Err(_) => Err(format!("{} timed out", what)),
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub user_id: Uuid,
    /// `true` when an existing pending account got a fresh activation token.
    pub reissued: bool,
}

pub struct RegistrationService {
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationSender>,
    hashes: HashPool,
    tokens: Arc<ActivationTokenManager>,
    settings: AuthSettings,
}

impl RegistrationService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSender>,
        hashes: HashPool,
        tokens: Arc<ActivationTokenManager>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            directory,
            notifier,
            hashes,
            tokens,
            settings,
        }
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Registered, RegistrationError> {
        let email = normalize_email(email);
        let username = username.trim().to_string();
        validate_registration(&email, &username, password)?;

        let limit = self.settings.outbound_timeout;

        let existing = bounded(limit, "find user by email", self.directory.find_by_email(&email))
            .await
            .map_err(RegistrationError::Internal)?;
        if let Some(user) = existing {
            return self.retry_pending(user, &username).await;
        }

        let taken = bounded(
            limit,
            "find user by username",
            self.directory.find_by_username(&username),
        )
        .await
        .map_err(RegistrationError::Internal)?;
        if taken.is_some() {
            return Err(RegistrationError::DuplicateUser);
        }

        let password_hash = self.hashes.hash(password.to_string()).await.map_err(|e| match e {
            HashError::TooLong => RegistrationError::InvalidInput("password is too long".to_string()),
            other => RegistrationError::Internal(other.to_string()),
        })?;

        let inserted = tokio::time::timeout(
            limit,
            self.directory.insert_user(
                NewUser {
                    email,
                    username,
                    password_hash,
                },
                Utc::now(),
            ),
        )
        .await
        .map_err(|_| RegistrationError::Internal("insert user timed out".to_string()))?;
        let user = match inserted {
            Ok(user) => user,
            Err(DirectoryError::Conflict(_)) => return Err(RegistrationError::DuplicateUser),
            Err(e) => return Err(RegistrationError::Internal(format!("insert user: {}", e))),
        };

        tracing::info!(user_id = %user.id, "registered pending user");
        self.send_activation(&user).await?;

        Ok(Registered {
            user_id: user.id,
            reissued: false,
        })
    }

    /// A repeat registration of a pending account whose activation email
    /// never went out (or whose token lapsed) gets a fresh token. Any other
    /// repeat is a duplicate. Stored credentials are never replaced.
    ///
    /// Two concurrent retries for the same account can both pass the live
    /// token check; each then mails its own valid link.
    async fn retry_pending(
        &self,
        user: User,
        username: &str,
    ) -> Result<Registered, RegistrationError> {
        if user.is_active() || user.username != username {
            return Err(RegistrationError::DuplicateUser);
        }

        let live = bounded(
            self.settings.outbound_timeout,
            "check live activation token",
            self.tokens.has_live_token(user.id, Utc::now()),
        )
        .await
        .map_err(RegistrationError::Internal)?;
        if live {
            return Err(RegistrationError::DuplicateUser);
        }

        tracing::info!(user_id = %user.id, "re-issuing activation token for pending user");
        self.send_activation(&user).await?;

        Ok(Registered {
            user_id: user.id,
            reissued: true,
        })
    }

    async fn send_activation(&self, user: &User) -> Result<(), RegistrationError> {
        let limit = self.settings.outbound_timeout;

        let token = self
            .tokens
            .mint(self.settings.activation_ttl, Utc::now())
            .map_err(|e| RegistrationError::Internal(e.to_string()))?;

        let stored = bounded(
            limit,
            "store activation token",
            self.tokens.store(user.id, &token),
        )
        .await;
        let sent = match stored {
            Ok(()) => {
                let link = self.settings.activation_link(&token.value);
                bounded(
                    limit,
                    "send activation email",
                    self.notifier.send_activation(&user.email, &link),
                )
                .await
            }
            Err(detail) => Err(detail),
        };

        if let Err(detail) = sent {
            // The insert may have committed even when the call failed.
            self.withdraw(user, &token).await;
            return Err(RegistrationError::Internal(detail));
        }

        let delivered = bounded(
            limit,
            "mark activation token delivered",
            self.tokens.mark_delivered(&token.value),
        )
        .await;
        if let Err(detail) = delivered {
            tracing::warn!(user_id = %user.id, %detail, "activation email sent but not recorded as delivered");
        }

        Ok(())
    }

    /// Best-effort removal of a token whose link never went out. A row left
    /// behind stays undelivered and does not block a retry.
    async fn withdraw(&self, user: &User, token: &IssuedActivationToken) {
        let revoked = bounded(
            self.settings.outbound_timeout,
            "revoke activation token",
            self.tokens.revoke(&token.value),
        )
        .await;
        if let Err(detail) = revoked {
            tracing::error!(user_id = %user.id, %detail, "failed to revoke undelivered activation token");
        }
    }
}

fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), RegistrationError> {
    if !is_valid_email(email) {
        return Err(RegistrationError::InvalidInput("invalid email address".to_string()));
    }
    if username.is_empty() {
        return Err(RegistrationError::InvalidInput("username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(RegistrationError::InvalidInput(format!(
            "username must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(RegistrationError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(RegistrationError::InvalidInput("password is too long".to_string()));
    }
    Ok(())
}

pub struct ActivationService {
    tokens: Arc<ActivationTokenManager>,
    settings: AuthSettings,
}

impl ActivationService {
    pub fn new(tokens: Arc<ActivationTokenManager>, settings: AuthSettings) -> Self {
        Self { tokens, settings }
    }

    /// Redeem an activation token and flip its owner to active.
    ///
    /// Both happen in one directory operation, so a failure here leaves the
    /// token redeemable.
    pub async fn activate(&self, token: &str) -> Result<Uuid, ActivationError> {
        let limit = self.settings.outbound_timeout;
        let redeemed = tokio::time::timeout(limit, self.tokens.redeem(token))
            .await
            .map_err(|_| ActivationError::Internal("redeem token timed out".to_string()))?;

        match redeemed {
            Ok(user_id) => {
                tracing::info!(%user_id, "user activated");
                Ok(user_id)
            }
            Err(ActivationTokenError::Storage(DirectoryError::NotFound(detail))) => {
                tracing::warn!(%detail, "valid activation token for missing user");
                Err(ActivationError::UserNotFound)
            }
            Err(ActivationTokenError::Storage(e)) => {
                Err(ActivationError::Internal(format!("redeem token: {}", e)))
            }
            Err(e) => {
                tracing::debug!(reason = %e, "activation token rejected");
                Err(ActivationError::InvalidOrExpiredToken)
            }
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user_id: Uuid,
    pub token: String,
}

pub struct LoginService {
    directory: Arc<dyn UserDirectory>,
    hashes: HashPool,
    issuer: Arc<IdentityTokenIssuer>,
    settings: AuthSettings,
}

impl LoginService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hashes: HashPool,
        issuer: Arc<IdentityTokenIssuer>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            directory,
            hashes,
            issuer,
            settings,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoggedIn, LoginError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(LoginError::InvalidInput("email and password are required".to_string()));
        }

        let found = bounded(
            self.settings.outbound_timeout,
            "find user by email",
            self.directory.find_by_email(&email),
        )
        .await
        .map_err(LoginError::Internal)?;

        // Unknown accounts cost one verification too.
        let Some(user) = found else {
            self.hashes
                .verify_dummy(password.to_string())
                .await
                .map_err(|e| LoginError::Internal(e.to_string()))?;
            return Err(LoginError::InvalidCredentials);
        };

        let matches = self
            .hashes
            .verify(password.to_string(), user.password_hash.clone())
            .await
            .map_err(|e| LoginError::Internal(e.to_string()))?;
        if !matches {
            return Err(LoginError::InvalidCredentials);
        }

        if !user.is_active() {
            return Err(LoginError::NotActivated);
        }

        let token = self
            .issuer
            .issue(user.id)
            .map_err(|e| LoginError::Internal(e.to_string()))?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(LoggedIn {
            user_id: user.id,
            token,
        })
    }
}

/// The three orchestrators, wired to one set of collaborators.
pub struct AuthService {
    pub registration: RegistrationService,
    pub activation: ActivationService,
    pub login: LoginService,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationSender>,
        hashes: HashPool,
        issuer: Arc<IdentityTokenIssuer>,
        settings: AuthSettings,
    ) -> Self {
        let tokens = Arc::new(ActivationTokenManager::new(directory.clone()));
        Self {
            registration: RegistrationService::new(
                directory.clone(),
                notifier,
                hashes.clone(),
                tokens.clone(),
                settings.clone(),
            ),
            activation: ActivationService::new(tokens, settings.clone()),
            login: LoginService::new(directory, hashes, issuer, settings),
        }
    }
}
