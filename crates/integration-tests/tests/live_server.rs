//! Tests against a running account settings server.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//!   (cargo run -p account-settings-cli -- migrate)
//! - A test customer created via
//!   `echo "$PASSWORD" | cargo run -p account-settings-cli -- user create -e ... -n ...`
//! - The server running (cargo run -p account-settings)
//!
//! Run with: cargo test -p account-settings-integration-tests --test live_server -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

/// Base URL of the server (configurable via environment).
fn base_url() -> String {
    std::env::var("ACCOUNT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Credentials of the pre-created test customer.
fn credentials() -> (String, String) {
    (
        std::env::var("ACCOUNT_TEST_EMAIL").unwrap_or_else(|_| "kunde@shop.example.de".to_string()),
        std::env::var("ACCOUNT_TEST_PASSWORD").unwrap_or_else(|_| "korrekt-pferd".to_string()),
    )
}

/// Client that keeps the session cookie. Proxy header so the rate limiter has a key.
fn client() -> Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        reqwest::header::HeaderValue::from_static("198.51.100.23"),
    );
    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

async fn logged_in_client() -> Client {
    let client = client();
    let (email, password) = credentials();
    let resp = client
        .post(format!("{}/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    client
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_ready_with_database() {
    let resp = client()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_preferences_round_trip_through_database() {
    let client = logged_in_client().await;
    let base_url = base_url();

    let resp = client
        .post(format!("{base_url}/api/account/privacy"))
        .json(&json!({ "data_collection": true }))
        .send()
        .await
        .expect("Failed to save privacy settings");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = client
        .get(format!("{base_url}/api/account"))
        .send()
        .await
        .expect("Failed to load overview")
        .json()
        .await
        .expect("Overview is not JSON");
    assert_eq!(body["data"]["privacy_settings"]["data_collection"], true);
    assert_eq!(body["data"]["privacy_settings"]["data_sharing"], false);
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_payment_default_survives_deletion() {
    let client = logged_in_client().await;
    let base_url = base_url();

    let mut ids = Vec::new();
    for email in ["live-a@paypal.example", "live-b@paypal.example"] {
        let body: Value = client
            .post(format!("{base_url}/api/account/payment-methods"))
            .json(&json!({ "type": "paypal", "paypal_email": email, "set_default": true }))
            .send()
            .await
            .expect("Failed to add payment method")
            .json()
            .await
            .expect("Response is not JSON");
        ids.push(body["data"]["id"].as_i64().expect("Payment method has an id"));
    }

    for id in &ids {
        let resp = client
            .delete(format!("{base_url}/api/account/payment-methods/{id}"))
            .send()
            .await
            .expect("Failed to delete payment method");
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = client
            .get(format!("{base_url}/api/account"))
            .send()
            .await
            .expect("Failed to load overview")
            .json()
            .await
            .expect("Overview is not JSON");
        let methods = body["data"]["payment_methods"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let defaults = methods.iter().filter(|m| m["is_default"] == true).count();
        assert!(methods.is_empty() || defaults == 1);
    }
}
