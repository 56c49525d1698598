//! Database query functions.
//!
//! [`PgDirectory`] implements the `UserDirectory` capability on PostgreSQL.
//! Uniqueness is enforced by the table constraints, and token consumption is
//! a single conditional `UPDATE`, so several service instances can share one
//! database without coordinating.

use super::models::{TokenStateRow, UserRow};
use adapters::{
    ActivationTokenRecord, DirectoryError, DirectoryResult, NewUser, TokenConsumption, User,
    UserDirectory, UserStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, status, created_at";

fn backend(err: sqlx::Error) -> DirectoryError {
    DirectoryError::Backend(err.to_string())
}

fn insert_error(err: sqlx::Error) -> DirectoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DirectoryError::Conflict(db.constraint().unwrap_or("unique").to_string())
        }
        _ => backend(err),
    }
}

#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_where(&self, column: &str, value: &str) -> DirectoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(User::try_from).transpose()
    }

    /// Explain why a token could not be consumed.
    async fn classify_unconsumed(&self, token_hash: &str) -> DirectoryResult<TokenConsumption> {
        let state: Option<TokenStateRow> = sqlx::query_as(
            "SELECT consumed_at FROM activation_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(match state {
            None => TokenConsumption::NotFound,
            Some(row) if row.consumed_at.is_some() => TokenConsumption::AlreadyConsumed,
            Some(_) => TokenConsumption::Expired,
        })
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> DirectoryResult<User> {
        let sql = format!(
            "INSERT INTO users (id, email, username, password_hash, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(UserStatus::Pending.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(insert_error)?;
        User::try_from(row)
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<User>> {
        self.find_user_where("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> DirectoryResult<Option<User>> {
        self.find_user_where("username", username).await
    }

    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(User::try_from).transpose()
    }

    async fn set_active(&self, id: Uuid) -> DirectoryResult<User> {
        let sql = format!(
            "UPDATE users SET status = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(UserStatus::Active.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.ok_or_else(|| DirectoryError::NotFound(format!("user {}", id)))?
            .try_into()
    }

    async fn insert_activation_token(&self, record: ActivationTokenRecord) -> DirectoryResult<()> {
        sqlx::query(
            "INSERT INTO activation_tokens (token_hash, user_id, expires_at, consumed_at, delivered_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.expires_at)
        .bind(record.consumed_at)
        .bind(record.delivered_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        Ok(())
    }

    async fn consume_activation_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption> {
        // Concurrent updates of the same row serialize on the row lock; a
        // loser re-checks `consumed_at IS NULL` and matches nothing.
        let consumed: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE activation_tokens SET consumed_at = $2 \
             WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2 \
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some((user_id,)) = consumed {
            return Ok(TokenConsumption::Consumed(user_id));
        }

        self.classify_unconsumed(token_hash).await
    }

    async fn activate_with_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> DirectoryResult<TokenConsumption> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let consumed: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE activation_tokens SET consumed_at = $2 \
             WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2 \
             RETURNING user_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some((user_id,)) = consumed else {
            tx.rollback().await.map_err(backend)?;
            return self.classify_unconsumed(token_hash).await;
        };

        let activated: Option<(Uuid,)> =
            sqlx::query_as("UPDATE users SET status = $2 WHERE id = $1 RETURNING id")
                .bind(user_id)
                .bind(UserStatus::Active.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;

        if activated.is_none() {
            // Rolling back keeps the token unconsumed.
            tx.rollback().await.map_err(backend)?;
            return Err(DirectoryError::NotFound(format!("user {}", user_id)));
        }

        tx.commit().await.map_err(backend)?;
        Ok(TokenConsumption::Consumed(user_id))
    }

    async fn delete_activation_token(&self, token_hash: &str) -> DirectoryResult<()> {
        sqlx::query("DELETE FROM activation_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn mark_activation_token_delivered(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> DirectoryResult<()> {
        let result =
            sqlx::query("UPDATE activation_tokens SET delivered_at = $2 WHERE token_hash = $1")
                .bind(token_hash)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(DirectoryError::NotFound("activation token".to_string()));
        }
        Ok(())
    }

    async fn has_live_activation_token(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DirectoryResult<bool> {
        let (live,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM activation_tokens \
             WHERE user_id = $1 AND delivered_at IS NOT NULL \
             AND consumed_at IS NULL AND expires_at > $2)",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(live)
    }
}
