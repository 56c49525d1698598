//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle user registration, email activation, and login.
//! They are designed to be merged into the main Axum router.

use super::handlers::{activate, login, register};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/activate/:token", get(activate))
}
