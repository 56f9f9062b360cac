use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

use knowledge_base::auth::hash_password;
use knowledge_base::config::Config;
use knowledge_base::database::{init_db, AppState};
use knowledge_base::route::create_app;

fn admin_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("admin123").expect("Failed to hash password"))
        .clone()
}

fn setup_test_app(session_ttl_hours: i64) -> (axum::Router, NamedTempFile, TempDir) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let uploads = TempDir::new().expect("Failed to create upload dir");
    let db = init_db(temp_db.path().to_str().unwrap()).expect("Failed to initialize test database");
    let config = Config {
        port: 0,
        database_url: temp_db.path().to_string_lossy().to_string(),
        admin_username: "admin".to_string(),
        admin_password_hash: admin_hash(),
        upload_dir: uploads.path().to_path_buf(),
        session_ttl_hours,
        seed_default_categories: false,
    };
    (create_app(AppState::new(db, config)), temp_db, uploads)
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

async fn try_login(app: &axum::Router, username: &str, password: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, response_json(response.into_body()).await)
}

async fn get_dashboard(app: &axum::Router, authorization: Option<&str>) -> StatusCode {
    let mut builder = Request::builder().method("GET").uri("/admin/dashboard");
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_admin_route_without_token() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["error"], "Invalid or missing authorization header");
}

#[tokio::test]
async fn test_admin_route_with_unknown_token() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    assert_eq!(
        get_dashboard(&app, Some("Bearer not-a-real-session")).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        get_dashboard(&app, Some("not-even-bearer")).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_login_with_wrong_credentials() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    let (status, body) = try_login(&app, "admin", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = try_login(&app, "root", "admin123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_grants_admin_access() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    let (status, body) = try_login(&app, "admin", "admin123").await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 48);
    assert!(body["expires_at"].is_string());

    assert_eq!(
        get_dashboard(&app, Some(&format!("Bearer {token}"))).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    let (_, body) = try_login(&app, "admin", "admin123").await;
    let bearer = format!("Bearer {}", body["token"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/logout")
                .header("Authorization", &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(get_dashboard(&app, Some(&bearer)).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    // A zero-hour lifetime makes every session expire as soon as it is issued
    let (app, _temp_db, _uploads) = setup_test_app(0);

    let (status, body) = try_login(&app, "admin", "admin123").await;
    assert_eq!(status, StatusCode::OK);
    let bearer = format!("Bearer {}", body["token"].as_str().unwrap());

    assert_eq!(get_dashboard(&app, Some(&bearer)).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_need_no_session() {
    let (app, _temp_db, _uploads) = setup_test_app(1);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/categories")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
