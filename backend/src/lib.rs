//! Keygate backend: account registration, email activation and login.
//!
//! The binary in `main.rs` only wires configuration, storage and the
//! notifier together; everything it serves is assembled by [`build_router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{routing::get, Json, Router};
use serde::Serialize;

pub use state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The full HTTP surface with state attached and global layers applied.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .merge(auth::routes::auth_router())
        .nest("/api/user", api::user::routes::user_router())
        .fallback(errors::route_not_found)
        .with_state(state);

    middleware::apply(router)
}
