//! Activation token lifecycle.
//!
//! A token is 32 bytes from the OS RNG, hex encoded for the activation link.
//! Only its SHA-256 digest is persisted. Each token moves from issued to
//! either consumed or expired, never both. Consumption is delegated to the
//! directory's atomic operations, so concurrent redemptions have one winner
//! and a redeemed token always leaves its owner active.

use super::errors::ActivationTokenError;
use adapters::{ActivationTokenRecord, TokenConsumption, UserDirectory};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;

/// A freshly minted token. `value` goes to the user and nowhere else.
#[derive(Debug, Clone)]
pub struct IssuedActivationToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 hex digest under which a token value is stored.
pub fn hash_token(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

fn is_well_formed(value: &str) -> bool {
    value.len() == TOKEN_BYTES * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Storage key for a presented value, or `None` if it could not have been
/// minted here.
fn lookup_hash(value: &str) -> Option<String> {
    is_well_formed(value).then(|| hash_token(&value.to_ascii_lowercase()))
}

fn consumption_result(outcome: TokenConsumption) -> Result<Uuid, ActivationTokenError> {
    match outcome {
        TokenConsumption::Consumed(user_id) => Ok(user_id),
        TokenConsumption::NotFound => Err(ActivationTokenError::NotFound),
        TokenConsumption::Expired => Err(ActivationTokenError::Expired),
        TokenConsumption::AlreadyConsumed => Err(ActivationTokenError::AlreadyConsumed),
    }
}

pub struct ActivationTokenManager {
    directory: Arc<dyn UserDirectory>,
}

impl ActivationTokenManager {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Generate a token value and its expiry without storing anything.
    ///
    /// Callers that bound [`store`](Self::store) with a timeout hold the value
    /// beforehand and can [`revoke`](Self::revoke) it whatever the outcome.
    pub fn mint(
        &self,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedActivationToken, ActivationTokenError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(ActivationTokenError::TtlOutOfRange)?;
        let mut random = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut random);
        Ok(IssuedActivationToken {
            value: hex::encode(random),
            expires_at,
        })
    }

    pub async fn store(
        &self,
        user_id: Uuid,
        token: &IssuedActivationToken,
    ) -> Result<(), ActivationTokenError> {
        self.directory
            .insert_activation_token(ActivationTokenRecord {
                token_hash: hash_token(&token.value),
                user_id,
                expires_at: token.expires_at,
                consumed_at: None,
                delivered_at: None,
            })
            .await
            .map_err(ActivationTokenError::from)
    }

    pub async fn issue(
        &self,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<IssuedActivationToken, ActivationTokenError> {
        self.issue_at(user_id, ttl, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        user_id: Uuid,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedActivationToken, ActivationTokenError> {
        let token = self.mint(ttl, now)?;
        self.store(user_id, &token).await?;
        Ok(token)
    }

    /// Consume a token and return its owner.
    pub async fn validate(&self, value: &str) -> Result<Uuid, ActivationTokenError> {
        self.validate_at(value, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, ActivationTokenError> {
        let Some(token_hash) = lookup_hash(value) else {
            return Err(ActivationTokenError::NotFound);
        };
        let outcome = self
            .directory
            .consume_activation_token(&token_hash, now)
            .await?;
        consumption_result(outcome)
    }

    /// Consume a token and activate its owner in the same directory step.
    ///
    /// A missing owner surfaces as `Storage(DirectoryError::NotFound)` and
    /// leaves the token unconsumed.
    pub async fn redeem(&self, value: &str) -> Result<Uuid, ActivationTokenError> {
        self.redeem_at(value, Utc::now()).await
    }

    pub async fn redeem_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, ActivationTokenError> {
        let Some(token_hash) = lookup_hash(value) else {
            return Err(ActivationTokenError::NotFound);
        };
        let outcome = self.directory.activate_with_token(&token_hash, now).await?;
        consumption_result(outcome)
    }

    /// Record that the link carrying `value` went out.
    pub async fn mark_delivered(&self, value: &str) -> Result<(), ActivationTokenError> {
        self.directory
            .mark_activation_token_delivered(&hash_token(value), Utc::now())
            .await
            .map_err(ActivationTokenError::from)
    }

    /// Withdraw an issued token, e.g. when its email could not be sent.
    /// Revoking a token that was never stored is not an error.
    pub async fn revoke(&self, value: &str) -> Result<(), ActivationTokenError> {
        self.directory
            .delete_activation_token(&hash_token(value))
            .await
            .map_err(ActivationTokenError::from)
    }

    /// Whether the user holds a delivered token that can still be redeemed.
    pub async fn has_live_token(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ActivationTokenError> {
        self.directory
            .has_live_activation_token(user_id, now)
            .await
            .map_err(ActivationTokenError::from)
    }
}
