//! End-to-end tests of the HTTP surface against the in-memory directory.

use adapters::{InMemoryDirectory, RecordingNotifier, UserDirectory};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use backend::config::AppConfig;
use backend::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "integration-secret-integration-secret";

struct TestApp {
    router: Router,
    notifier: Arc<RecordingNotifier>,
    directory: Arc<InMemoryDirectory>,
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SECRET.to_string(),
        activate_base_url: "http://localhost:8080/activate".to_string(),
        hash_memory_kib: 256,
        hash_iterations: 1,
        hash_parallelism: 1,
        hash_workers: 2,
        ..AppConfig::default()
    }
}

fn app() -> TestApp {
    let directory = Arc::new(InMemoryDirectory::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState::new(&test_config(), directory.clone(), notifier.clone()).unwrap();
    TestApp {
        router: build_router(state),
        notifier,
        directory,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let authorization = response
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, authorization, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn register(app: &TestApp, email: &str, username: &str, password: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        &app.router,
        post_json(
            "/register",
            json!({ "email": email, "username": username, "password": password }),
        ),
    )
    .await;
    (status, body)
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Option<String>, Value) {
    send(
        &app.router,
        post_json("/login", json!({ "email": email, "password": password })),
    )
    .await
}

async fn activation_path(app: &TestApp, email: &str) -> String {
    let link = app.notifier.last_link_for(email).await.unwrap();
    let token = link.rsplit('/').next().unwrap();
    format!("/activate/{}", token)
}

#[tokio::test]
async fn test_full_account_lifecycle() {
    let app = app();

    let (status, body) = register(&app, "alice@example.com", "alice", "correct horse").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["message"].is_string());

    let (status, _, body) = login(&app, "alice@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account not activated");

    let path = activation_path(&app, "alice@example.com").await;
    let (status, _, body) = send(&app.router, get(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account activated successfully. You can now log in.");

    let (status, _, _) = send(&app.router, get(&path)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, authorization, body) = login(&app, "alice@example.com", "correct horse").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(authorization, Some(format!("Bearer {}", token)));

    let request = Request::builder()
        .uri("/api/user/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["status"], "active");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = app();
    let (status, _) = register(&app, "bob@example.com", "bob", "password123").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "bob@example.com", "bob", "password123").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");

    let (status, _) = register(&app, "other@example.com", "bob", "password123").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = register(&app, "BOB@Example.com", "bobby", "password123").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_registration_input_errors() {
    let app = app();

    for body in [
        json!({ "email": "", "username": "u", "password": "password123" }),
        json!({ "email": "not-an-email", "username": "u", "password": "password123" }),
        json!({ "email": "u@example.com", "username": "", "password": "password123" }),
        json!({ "email": "u@example.com", "username": "u", "password": "short" }),
        json!({ "email": "u@example.com", "username": "u" }),
    ] {
        let (status, _, response) = send(&app.router, post_json("/register", body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert!(response["error"].is_string());
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    assert!(app.notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
    let app = app();
    register(&app, "carol@example.com", "carol", "password123").await;
    let path = activation_path(&app, "carol@example.com").await;
    send(&app.router, get(&path)).await;

    let (wrong_status, wrong_header, wrong_body) =
        login(&app, "carol@example.com", "password124").await;
    let (unknown_status, unknown_header, unknown_body) =
        login(&app, "nobody@example.com", "password123").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"], "Invalid email or password");
    assert!(wrong_header.is_none() && unknown_header.is_none());
}

#[tokio::test]
async fn test_login_with_empty_fields_is_bad_request() {
    let app = app();
    let (status, _, _) = login(&app, "", "password123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = login(&app, "dave@example.com", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_garbage_activation_token() {
    let app = app();
    for path in ["/activate/garbage", &format!("/activate/{}", "ab".repeat(32))] {
        let (status, _, body) = send(&app.router, get(path)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(body["error"], "Invalid or expired activation token");
    }
}

#[tokio::test]
async fn test_profile_requires_valid_bearer_token() {
    let app = app();

    let (status, _, body) = send(&app.router, get("/api/user/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .uri("/api/user/me")
        .header(header::AUTHORIZATION, "Bearer not.a.token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_notification_leaves_no_live_token() {
    let app = app();
    app.notifier.set_failing(true);

    let (status, body) = register(&app, "erin@example.com", "erin", "password123").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal server error");
    assert_eq!(app.directory.token_count().await, 0);

    // The pending account stays; a retry with the same username re-sends.
    app.notifier.set_failing(false);
    let (status, _) = register(&app, "erin@example.com", "erin", "password123").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(app.notifier.last_link_for("erin@example.com").await.is_some());

    let user = app
        .directory
        .find_by_email("erin@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!user.is_active());
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_undecodable_activation_segment_is_json_400() {
    let app = app();
    let (status, _, body) = send(&app.router, get("/activate/%FF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired activation token");
}

#[tokio::test]
async fn test_framework_errors_have_json_bodies() {
    let app = app();

    let (status, _, body) = send(&app.router, get("/register")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "method not allowed");

    let (status, _, body) = send(&app.router, get("/no/such/route")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

