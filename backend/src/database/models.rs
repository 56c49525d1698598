//! Rust structs that represent database table mappings.
//!
//! These rows mirror the `users` and `activation_tokens` tables and convert
//! into the directory models shared through the `adapters` crate.

use adapters::{DirectoryError, User, UserStatus};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DirectoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = UserStatus::parse(&row.status).ok_or_else(|| {
            DirectoryError::Backend(format!("user {} has unknown status {:?}", row.id, row.status))
        })?;
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            status,
            created_at: row.created_at,
        })
    }
}

/// The columns read back when a consume attempt matched no row.
#[derive(Debug, FromRow)]
pub struct TokenStateRow {
    pub consumed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            username: "u".to_string(),
            password_hash: "$argon2id$x".to_string(),
            status: status.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion() {
        let user = User::try_from(row("active")).unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(User::try_from(row("pending")).unwrap().status, UserStatus::Pending);
    }

    #[test]
    fn test_unknown_status_is_backend_error() {
        assert!(matches!(
            User::try_from(row("banned")),
            Err(DirectoryError::Backend(_))
        ));
    }
}
