//! Global application error types and handlers.
//!
//! This module defines the error type every HTTP handler returns and maps the
//! authentication errors onto it, so all failures leave the service as
//! `{"error": "..."}` with a consistent status code. Internal details are
//! logged here and never sent to the client.

use crate::auth::errors::{
    ActivationError, HashError, IdentityTokenError, LoginError, RegistrationError,
};
use crate::config::ConfigError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Detail is logged, never returned.
    #[error("{0}")]
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures that stop the service before it serves traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Password hasher: {0}")]
    Hasher(#[from] HashError),

    #[error("Identity token issuer: {0}")]
    Issuer(#[from] IdentityTokenError),
}

/// Handler for requests no route matches.
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("resource not found".to_string())
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::InvalidInput(msg) => ApiError::BadRequest(msg),
            RegistrationError::DuplicateUser => ApiError::Conflict(err.to_string()),
            RegistrationError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<ActivationError> for ApiError {
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::InvalidOrExpiredToken => ApiError::BadRequest(err.to_string()),
            ActivationError::UserNotFound => ApiError::NotFound(err.to_string()),
            ActivationError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidInput(msg) => ApiError::BadRequest(msg),
            LoginError::InvalidCredentials | LoginError::NotActivated => {
                ApiError::Unauthorized(err.to_string())
            }
            LoginError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<IdentityTokenError> for ApiError {
    fn from(err: IdentityTokenError) -> Self {
        match err {
            IdentityTokenError::Signing(detail) => ApiError::Internal(detail),
            _ => ApiError::Unauthorized("invalid or expired token".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let (status, body) = body_of(ApiError::Internal("db password rejected".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_registration_mapping() {
        assert_eq!(
            ApiError::from(RegistrationError::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RegistrationError::DuplicateUser).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RegistrationError::Internal("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_activation_mapping() {
        assert_eq!(
            ApiError::from(ActivationError::InvalidOrExpiredToken).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ActivationError::UserNotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_login_mapping() {
        let (status, body) = body_of(LoginError::NotActivated.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "Account not activated");

        let (status, _) = body_of(LoginError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_token_errors_are_unauthorized() {
        for err in [
            IdentityTokenError::Malformed,
            IdentityTokenError::BadSignature,
            IdentityTokenError::Expired,
        ] {
            assert_eq!(ApiError::from(err).status(), StatusCode::UNAUTHORIZED);
        }
    }
}
