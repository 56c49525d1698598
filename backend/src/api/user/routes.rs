//! Defines the HTTP routes for user profile data.

use super::handlers::current_user;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn user_router() -> Router<AppState> {
    Router::new().route("/me", get(current_user))
}
