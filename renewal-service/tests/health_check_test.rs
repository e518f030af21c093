//! Health check integration tests for renewal-service.

mod common;

use common::{monthly, utc, ymd, TestApp};
use reqwest::Client;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn(utc(2024, 1, 10, 12)).await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/health", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "renewal-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn(utc(2024, 1, 10, 12)).await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/ready", app.http_address))
        .header("x-request-id", "req-42")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
}

#[tokio::test]
async fn metrics_endpoint_works() {
    let app = TestApp::spawn(utc(2024, 1, 10, 12)).await;
    let client = Client::new();

    let response = client
        .get(&format!("{}/metrics", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap_or("").contains("text/plain"))
        .unwrap_or(false));

    // The scheduler runs a pass as soon as it starts.
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("renewal_evaluation_passes_total"));
}

#[tokio::test]
async fn evaluate_endpoint_returns_report() {
    let app = TestApp::spawn(utc(2024, 1, 10, 12)).await;
    app.subscriptions
        .create_subscription(monthly("Editor", ymd(2024, 1, 1), ymd(2024, 2, 1)))
        .await
        .unwrap();
    app.clock.set(utc(2024, 2, 5, 12));

    let response = Client::new()
        .post(&format!("{}/evaluate", app.http_address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["evaluated"], 1);
    assert_eq!(body["renewed"][0]["expiryDate"], "2024-03-01");
    assert_eq!(body["notificationsSuppressed"], false);
}
