//! Generic data models for the `adapters` crate.
//!
//! These models define the records exchanged between the authentication core
//! and whatever backs the user directory, so every directory implementation
//! (in-memory, PostgreSQL) speaks the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle gate of an account.
///
/// The only legal transition is `Pending -> Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(UserStatus::Pending),
            "active" => Some(UserStatus::Active),
            _ => None,
        }
    }
}

/// A stored user record. Holds the password hash, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Normalised (trimmed, lower-cased) email address.
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Parameters for creating a pending user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// An activation token as persisted by the directory.
///
/// `token_hash` is the SHA-256 hex digest of the value mailed to the user;
/// the raw value is never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    /// Set once the link carrying this token was accepted for delivery.
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ActivationTokenRecord {
    /// Why a consume attempt at `now` would be refused, if it would be.
    pub fn refusal_at(&self, now: DateTime<Utc>) -> Option<TokenConsumption> {
        if self.consumed_at.is_some() {
            Some(TokenConsumption::AlreadyConsumed)
        } else if now >= self.expires_at {
            Some(TokenConsumption::Expired)
        } else {
            None
        }
    }
}

/// Outcome of an atomic consume attempt on an activation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenConsumption {
    /// This caller consumed the token; carries the owning user id.
    Consumed(Uuid),
    NotFound,
    Expired,
    AlreadyConsumed,
}
