use tradejournal::config::{Config, MockCredentials, UploadLimits};
use tradejournal::error::{AppError, BusinessCode};
use tradejournal::middleware::{
    bearer_token, envelope_rejections, log_requests, resolve_user, AuthTokenHash,
};
use tradejournal::server::build_api_router;
use tradejournal::state::AppState;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::{from_fn, map_response};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::util::ServiceExt;
use tower_http::limit::RequestBodyLimitLayer;

fn hello_app() -> Router {
    let temp_dir = std::env::temp_dir();
    let state = Arc::new(AppState::new(
        temp_dir,
        UploadLimits {
            max_upload_size: 1024,
            max_chunk_size: 256,
        },
    ));
    build_api_router(state, &MockCredentials::default())
}

async fn hello_message(app: &Router, auth: Option<&str>) -> serde_json::Value {
    get_json(app, "/api/hello", auth).await
}

async fn get_json(app: &Router, uri: &str, auth: Option<&str>) -> serde_json::Value {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_resolve_user_with_valid_token() {
    let app = hello_app();

    let body = hello_message(&app, Some("Bearer mock_token_123456")).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["message"], "Hello, Administrator!");
    assert_eq!(body["data"]["user"]["username"], "admin");
    assert_eq!(body["data"]["user"]["id"], 1);
}

#[tokio::test]
async fn test_resolve_user_is_anonymous_otherwise() {
    let app = hello_app();

    for auth in [None, Some("Bearer wrong"), Some("Basic mock_token_123456"), Some("mock_token_123456")] {
        let body = hello_message(&app, auth).await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["message"], "Hello, World!");
        assert!(body["data"].get("user").is_none());
    }
}

#[tokio::test]
async fn test_resolve_user_without_configured_hash() {
    let app = Router::new()
        .route("/", get(|user: Option<axum::Extension<tradejournal::models::CurrentUser>>| async move {
            if user.is_some() { "user" } else { "anonymous" }
        }))
        .layer(from_fn(resolve_user));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::AUTHORIZATION, "Bearer mock_token_123456")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"anonymous");

    // hash present via extension layer
    let app = Router::new()
        .route("/", get(|user: Option<axum::Extension<tradejournal::models::CurrentUser>>| async move {
            if user.is_some() { "user" } else { "anonymous" }
        }))
        .layer(from_fn(resolve_user))
        .layer(axum::Extension(AuthTokenHash(Config::hash_token("t0k3n"))));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::AUTHORIZATION, "Bearer t0k3n")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"user");
}

#[test]
fn test_bearer_token_parsing() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer_token(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert_eq!(bearer_token(&headers), Some("abc"));

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
    assert_eq!(bearer_token(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer a b"));
    assert_eq!(bearer_token(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
    assert_eq!(bearer_token(&headers), None);
}

#[tokio::test]
async fn test_error_response_carries_business_code() {
    let response = AppError::SessionNotFound("x".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.extensions().get::<BusinessCode>().unwrap().0, 400);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("x"));
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_log_requests_passes_response_through() {
    let app = Router::new()
        .route("/ok", get(|| async { "fine" }))
        .route("/fail", get(|| async { AppError::AssemblyFailed("disk".to_string()) }))
        .layer(from_fn(log_requests));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.extensions().get::<BusinessCode>().unwrap().0, 500);
}

async fn login(app: &Router, username: &str, password: &str) -> serde_json::Value {
    let body = serde_json::json!({"username": username, "password": password});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_login_hands_out_bearer_token() {
    let app = hello_app();

    let body = login(&app, "admin", "123456").await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["token"], "mock_token_123456");
    assert_eq!(body["data"]["user_info"]["username"], "admin");

    // the issued token resolves the user on later requests
    let auth = format!("Bearer {}", body["data"]["token"].as_str().unwrap());
    let current = get_json(&app, "/api/users/current", Some(&auth)).await;
    assert_eq!(current["code"], 0);
    assert_eq!(current["data"]["id"], 1);
    assert_eq!(current["data"]["nickname"], "Administrator");

    let profile = get_json(&app, "/api/users/profile", Some(&auth)).await;
    assert_eq!(profile["code"], 0);
    assert_eq!(profile["data"]["email"], "admin@example.com");
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = hello_app();

    let body = login(&app, "admin", "wrong").await;
    assert_eq!(body["code"], 401);
    assert!(body["data"].is_null());

    let body = login(&app, "", "").await;
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_user_endpoints_require_login() {
    let app = hello_app();

    for uri in ["/api/users/current", "/api/users/profile"] {
        for auth in [None, Some("Bearer wrong")] {
            let body = get_json(&app, uri, auth).await;
            assert_eq!(body["code"], 401, "{} with {:?}", uri, auth);
            assert!(body["data"].is_null());
        }
    }
}

#[tokio::test]
async fn test_transport_rejections_use_envelope() {
    let app = Router::new()
        .route("/upload", post(|body: axum::body::Bytes| async move { body.len().to_string() }))
        .route(
            "/busy",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "3")], "slow down") }),
        )
        .layer(RequestBodyLimitLayer::new(8))
        .layer(map_response(envelope_rejections));

    let oversized = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_LENGTH, "32")
        .body(Body::from(vec![0u8; 32]))
        .unwrap();
    let response = app.clone().oneshot(oversized).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
    assert!(body["data"].is_null());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/busy").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::RETRY_AFTER], "3");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 429);

    // everything else is untouched
    let small = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::CONTENT_LENGTH, "4")
        .body(Body::from("abcd"))
        .unwrap();
    let response = app.oneshot(small).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"4");
}
