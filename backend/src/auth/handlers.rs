//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, account
//! activation, and login, parse request data, and hand off to the
//! `auth::service` orchestrators for the core business logic.

use super::errors::ActivationError;
use super::models::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use crate::errors::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(request) = payload?;

    let registered = state
        .auth
        .registration
        .register(&request.email, &request.username, &request.password)
        .await?;

    let message = if registered.reissued {
        "Activation email re-sent. Please check your inbox to activate your account."
    } else {
        "Registration successful. Please check your email to activate your account."
    };
    Ok((StatusCode::CREATED, Json(MessageResponse::new(message))))
}

/// `GET /activate/{token}`. A segment that does not even decode is just
/// another invalid token.
pub async fn activate(
    State(state): State<AppState>,
    token: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Ok(Path(token)) = token else {
        return Err(ActivationError::InvalidOrExpiredToken.into());
    };
    state.auth.activation.activate(&token).await?;
    Ok(Json(MessageResponse::new(
        "Account activated successfully. You can now log in.",
    )))
}

/// `POST /login`. The token is returned in the body and as an
/// `Authorization: Bearer` header.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;

    let logged_in = state
        .auth
        .login
        .login(&request.email, &request.password)
        .await?;

    Ok((
        StatusCode::OK,
        [(header::AUTHORIZATION, format!("Bearer {}", logged_in.token))],
        Json(LoginResponse {
            message: "Login successful".to_string(),
            token: logged_in.token,
        }),
    ))
}
