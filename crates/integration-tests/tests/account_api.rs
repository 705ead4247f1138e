//! The HTTP surface of the account settings service, driven in-process.
//!
//! Requests go through the full router with an in-memory session store.
//!
//! Run with: cargo test -p account-settings-integration-tests --test account_api

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use account_settings_integration_tests::{CUSTOMER_EMAIL, CUSTOMER_PASSWORD, TestContext};

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(request.body(body).expect("Failed to build request"))
        .await
        .expect("Router is infallible")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response");
    serde_json::from_slice(&bytes).expect("Response is not JSON")
}

/// Log in and return the `name=value` part of the session cookie.
async fn login(app: &Router) -> String {
    let response = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": CUSTOMER_EMAIL, "password": CUSTOMER_PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Login sets a session cookie")
        .to_str()
        .unwrap();
    cookie.split(';').next().unwrap().to_owned()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestContext::new().await.router();

    let response = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, "/health/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_settings_require_session() {
    let app = TestContext::new().await.router();

    let response = send(&app, Method::GET, "/api/account", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestContext::new().await.router();

    let response = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": CUSTOMER_EMAIL, "password": "falsches-pferd" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_login_then_overview() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(&app, Method::GET, "/api/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["account"]["email"], CUSTOMER_EMAIL);
    assert_eq!(body["data"]["billing"]["billing_email"], CUSTOMER_EMAIL);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(&app, Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::GET, "/api/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_invalid_payment_method_names_field() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/account/payment-methods",
        Some(&cookie),
        Some(json!({
            "type": "card",
            "card_number": "4111 1111 1111 1111",
            "card_name": "Erika Mustermann",
            "card_expiry": "2029-12",
            "card_cvv": "123"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("MM/YY"));
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/account/privacy",
        Some(&cookie),
        Some(json!({ "data_sharing": "ja" })),
    )
    .await;
    assert!(response.status().is_client_error());

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_email_change_logs_out() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/account/personal",
        Some(&cookie),
        Some(json!({ "email": "neu@shop.example.de" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["logout_required"], true);
    assert_eq!(body["data"]["email"], "neu@shop.example.de");

    let response = send(&app, Method::GET, "/api/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_address_is_not_found() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::DELETE,
        "/api/account/shipping/addresses/9999",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reject_link_without_token_is_not_found() {
    let ctx = TestContext::new().await;
    let app = ctx.router();

    let uri = format!("/api/account/billing-email/reject?user_id={}", ctx.user);
    let response = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::GET,
        "/api/account/billing-email/reject?token=abc&user_id=kein",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Deletion and export
// ============================================================================

#[tokio::test]
async fn test_export_is_attachment() {
    let ctx = TestContext::new().await;
    let app = ctx.router();
    let cookie = login(&app).await;

    let response = send(&app, Method::GET, "/api/account/export", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(disposition.starts_with("attachment; filename=\"user-data-"));
    assert!(disposition.ends_with(".json\""));

    let body = json_body(response).await;
    assert_eq!(body["account_info"]["email"], CUSTOMER_EMAIL);
    assert!(body["orders"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_account_with_wrong_password_is_forbidden() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/account/delete",
        Some(&cookie),
        Some(json!({ "password": "falsches-pferd" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::GET, "/api/account", Some(&cookie), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_account_logs_out() {
    let app = TestContext::new().await.router();
    let cookie = login(&app).await;

    let response = send(
        &app,
        Method::POST,
        "/api/account/delete",
        Some(&cookie),
        Some(json!({ "password": CUSTOMER_PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["logout_required"], true);

    let response = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": CUSTOMER_EMAIL, "password": CUSTOMER_PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_without_session_requires_login() {
    let app = TestContext::new().await.router();

    let response = send(
        &app,
        Method::POST,
        "/api/account/delete",
        None,
        Some(json!({ "password": CUSTOMER_PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
