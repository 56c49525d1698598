//! Handler functions for user profile API endpoints.
//!
//! These functions resolve the bearer token's subject against the directory
//! and return user-specific information. The password hash never leaves
//! the service.

use crate::auth::AuthenticatedUser;
use crate::errors::{ApiError, ApiResult};
use crate::state::AppState;
use adapters::{User, UserStatus};
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            status: user.status,
            created_at: user.created_at,
        }
    }
}

/// `GET /api/user/me`
pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> ApiResult<Json<UserProfile>> {
    let user = state
        .directory
        .find_by_id(auth.user_id)
        .await
        .map_err(|e| ApiError::Internal(format!("find user by id: {}", e)))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
