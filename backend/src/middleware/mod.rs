//! General-purpose middleware for the API.
//!
//! This module assembles the tower layers applied to the whole router:
//! request tracing, a request timeout, CORS, and a final pass that gives
//! framework-generated errors (405, 408, ...) the `{"error": ...}` body
//! every handler error already has.

use crate::errors::ErrorResponse;
use axum::http::header::{ALLOW, AUTHORIZATION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{middleware::map_response, Json, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn apply(router: Router) -> Router {
    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(map_response(json_error_body))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([AUTHORIZATION]),
        )
}

/// Replace the body of an untyped error response with `{"error": ...}`.
async fn json_error_body(response: Response) -> Response {
    let status = response.status();
    let is_error = status.is_client_error() || status.is_server_error();
    if !is_error || response.headers().contains_key(CONTENT_TYPE) {
        return response;
    }

    let error = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_ascii_lowercase();
    let mut rewritten = (status, Json(ErrorResponse { error })).into_response();
    if let Some(allow) = response.headers().get(ALLOW) {
        rewritten.headers_mut().insert(ALLOW, allow.clone());
    }
    rewritten
}
