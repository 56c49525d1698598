//! Core `adapters` crate for abstracting the collaborators of the auth core.
//!
//! This crate defines the [`UserDirectory`] and [`NotificationSender`] traits
//! the authentication orchestrators depend on, and provides concrete
//! implementations: an in-memory directory for tests and development, and
//! notifiers that log, record, or deliver through an HTTP email API.

pub mod errors;
pub mod mailer;
pub mod memory;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use errors::{DirectoryError, DirectoryResult, NotifyError};
pub use mailer::{HttpMailer, HttpMailerConfig, LogNotifier, RecordingNotifier, SentActivation};
pub use memory::InMemoryDirectory;
pub use models::{ActivationTokenRecord, NewUser, TokenConsumption, User, UserStatus};

/// Durable storage of user records and their activation tokens.
///
/// Every mutating method must be atomic at the storage layer: several
/// service instances may share one directory, so implementations cannot rely
/// on in-process locking held by the caller.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a pending user. Fails with [`DirectoryError::Conflict`] when the
    /// email or username is already taken.
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> DirectoryResult<User>;

    /// Look up by normalised email.
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> DirectoryResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<User>>;

    /// Flip a user to `Active`. Idempotent for an already active user;
    /// [`DirectoryError::NotFound`] when no such user exists.
    async fn set_active(&self, id: Uuid) -> DirectoryResult<User>;

    /// Consume the token with the given hash and flip its owner to `Active`
    /// as one atomic step.
    ///
    /// [`TokenConsumption::Consumed`] means both happened. When the token is
    /// consumable but its owner is gone the result is
    /// [`DirectoryError::NotFound`] and the token stays unconsumed. A failed
    /// call leaves both the token and the user untouched.
    async fn activate_with_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption>;

    async fn insert_activation_token(&self, record: ActivationTokenRecord) -> DirectoryResult<()>;

    /// Atomically consume the token with the given hash.
    ///
    /// Under concurrent calls for the same hash exactly one caller observes
    /// [`TokenConsumption::Consumed`]; an expired token is reported without
    /// being consumed.
    async fn consume_activation_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption>;

    async fn delete_activation_token(&self, token_hash: &str) -> DirectoryResult<()>;

    /// Record that the token was handed to the notification sender.
    async fn mark_activation_token_delivered(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DirectoryResult<()>;

    /// Whether the user holds a delivered, unconsumed, unexpired activation
    /// token. Tokens that never reached the notifier do not count.
    async fn has_live_activation_token(&self, user_id: Uuid, now: DateTime<Utc>)
        -> DirectoryResult<bool>;
}

/// Delivers activation links to a user's registered address.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_activation(&self, email: &str, link: &str) -> Result<(), NotifyError>;
}
