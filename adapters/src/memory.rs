//! In-memory implementation of the `UserDirectory` trait.
//!
//! Backs local development and tests. Uniqueness checks and token
//! consumption each happen under a single write lock, which gives the same
//! atomicity a unique constraint or conditional update gives in a database.

use crate::errors::{DirectoryError, DirectoryResult};
use crate::models::{ActivationTokenRecord, NewUser, TokenConsumption, User, UserStatus};
use crate::UserDirectory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    tokens: Arc<Mutex<HashMap<String, ActivationTokenRecord>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored activation tokens, consumed ones included.
    pub async fn token_count(&self) -> usize {
        self.tokens.lock().await.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> DirectoryResult<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(DirectoryError::Conflict("email already registered".to_string()));
        }
        if users.values().any(|u| u.username == user.username) {
            return Err(DirectoryError::Conflict("username already taken".to_string()));
        }

        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            status: UserStatus::Pending,
            created_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DirectoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn set_active(&self, id: Uuid) -> DirectoryResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| DirectoryError::NotFound(format!("user {}", id)))?;
        user.status = UserStatus::Active;
        Ok(user.clone())
    }

    async fn insert_activation_token(&self, record: ActivationTokenRecord) -> DirectoryResult<()> {
        let mut tokens = self.tokens.lock().await;
        if tokens.contains_key(&record.token_hash) {
            return Err(DirectoryError::Conflict("activation token collision".to_string()));
        }
        tokens.insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn consume_activation_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption> {
        let mut tokens = self.tokens.lock().await;
        let Some(record) = tokens.get_mut(token_hash) else {
            return Ok(TokenConsumption::NotFound);
        };
        if let Some(refusal) = record.refusal_at(now) {
            return Ok(refusal);
        }

        record.consumed_at = Some(now);
        Ok(TokenConsumption::Consumed(record.user_id))
    }

    async fn activate_with_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption> {
        // Lock order: users, then tokens.
        let mut users = self.users.write().await;
        let mut tokens = self.tokens.lock().await;

        let Some(record) = tokens.get_mut(token_hash) else {
            return Ok(TokenConsumption::NotFound);
        };
        if let Some(refusal) = record.refusal_at(now) {
            return Ok(refusal);
        }
        let user = users
            .get_mut(&record.user_id)
            .ok_or_else(|| DirectoryError::NotFound(format!("user {}", record.user_id)))?;

        record.consumed_at = Some(now);
        user.status = UserStatus::Active;
        Ok(TokenConsumption::Consumed(user.id))
    }

    async fn delete_activation_token(&self, token_hash: &str) -> DirectoryResult<()> {
        self.tokens.lock().await.remove(token_hash);
        Ok(())
    }

    async fn mark_activation_token_delivered(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DirectoryResult<()> {
        let mut tokens = self.tokens.lock().await;
        let record = tokens
            .get_mut(token_hash)
            .ok_or_else(|| DirectoryError::NotFound("activation token".to_string()))?;
        record.delivered_at = Some(at);
        Ok(())
    }

    async fn has_live_activation_token(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DirectoryResult<bool> {
        let tokens = self.tokens.lock().await;
        Ok(tokens.values().any(|t| {
            t.user_id == user_id && t.delivered_at.is_some() && t.refusal_at(now).is_none()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        }
    }

    fn token(hash: &str, user_id: Uuid, expires_at: DateTime<Utc>) -> ActivationTokenRecord {
        ActivationTokenRecord {
            token_hash: hash.to_string(),
            user_id,
            expires_at,
            consumed_at: None,
            delivered_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let dir = InMemoryDirectory::new();
        let user = dir.insert_user(new_user("a@b.com", "u"), Utc::now()).await.unwrap();
        assert_eq!(user.status, UserStatus::Pending);

        let by_email = dir.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        let by_name = dir.find_by_username("u").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(dir.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_and_username_conflict() {
        let dir = InMemoryDirectory::new();
        dir.insert_user(new_user("a@b.com", "u"), Utc::now()).await.unwrap();

        let dup_email = dir.insert_user(new_user("a@b.com", "other"), Utc::now()).await;
        assert!(matches!(dup_email, Err(DirectoryError::Conflict(_))));

        let dup_name = dir.insert_user(new_user("c@d.com", "u"), Utc::now()).await;
        assert!(matches!(dup_name, Err(DirectoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_set_active_missing_user() {
        let dir = InMemoryDirectory::new();
        let result = dir.set_active(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_consume_token_lifecycle() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        dir.insert_activation_token(token("h1", owner, now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(
            dir.consume_activation_token("h1", now).await.unwrap(),
            TokenConsumption::Consumed(owner)
        );
        assert_eq!(
            dir.consume_activation_token("h1", now).await.unwrap(),
            TokenConsumption::AlreadyConsumed
        );
        assert_eq!(
            dir.consume_activation_token("missing", now).await.unwrap(),
            TokenConsumption::NotFound
        );
    }

    #[tokio::test]
    async fn test_expired_token_not_consumed() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        dir.insert_activation_token(token("h1", owner, now)).await.unwrap();

        assert_eq!(
            dir.consume_activation_token("h1", now).await.unwrap(),
            TokenConsumption::Expired
        );
        assert!(!dir.has_live_activation_token(owner, now).await.unwrap());
        // Still expired, never flipped to consumed.
        assert_eq!(
            dir.consume_activation_token("h1", now + Duration::seconds(1)).await.unwrap(),
            TokenConsumption::Expired
        );
    }

    #[tokio::test]
    async fn test_live_token_tracking() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let owner = Uuid::new_v4();
        assert!(!dir.has_live_activation_token(owner, now).await.unwrap());

        dir.insert_activation_token(token("h1", owner, now + Duration::hours(1)))
            .await
            .unwrap();
        // Not live until the link went out.
        assert!(!dir.has_live_activation_token(owner, now).await.unwrap());
        dir.mark_activation_token_delivered("h1", now).await.unwrap();
        assert!(dir.has_live_activation_token(owner, now).await.unwrap());
        assert!(!dir
            .has_live_activation_token(owner, now + Duration::hours(1))
            .await
            .unwrap());

        dir.delete_activation_token("h1").await.unwrap();
        assert!(!dir.has_live_activation_token(owner, now).await.unwrap());
        assert_eq!(dir.token_count().await, 0);
    }

    #[tokio::test]
    async fn test_activate_with_token_flips_user() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let user = dir.insert_user(new_user("a@b.com", "u"), now).await.unwrap();
        dir.insert_activation_token(token("h1", user.id, now + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(
            dir.activate_with_token("h1", now).await.unwrap(),
            TokenConsumption::Consumed(user.id)
        );
        assert!(dir.find_by_id(user.id).await.unwrap().unwrap().is_active());
        assert_eq!(
            dir.activate_with_token("h1", now).await.unwrap(),
            TokenConsumption::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_activate_with_token_for_missing_owner_keeps_token() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let orphan = Uuid::new_v4();
        dir.insert_activation_token(token("h1", orphan, now + Duration::hours(1)))
            .await
            .unwrap();

        let result = dir.activate_with_token("h1", now).await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
        assert_eq!(
            dir.consume_activation_token("h1", now).await.unwrap(),
            TokenConsumption::Consumed(orphan)
        );
    }

    #[tokio::test]
    async fn test_activate_with_expired_token_leaves_user_pending() {
        let dir = InMemoryDirectory::new();
        let now = Utc::now();
        let user = dir.insert_user(new_user("a@b.com", "u"), now).await.unwrap();
        dir.insert_activation_token(token("h1", user.id, now)).await.unwrap();

        assert_eq!(
            dir.activate_with_token("h1", now).await.unwrap(),
            TokenConsumption::Expired
        );
        assert!(!dir.find_by_id(user.id).await.unwrap().unwrap().is_active());
    }
}
