mod common;

use common::{restaurant_admin_token, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "subscription-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn metrics_endpoint_exposes_workflow_counters() {
    let app = TestApp::spawn().await;

    // Touch an authenticated route so HTTP metrics have a sample.
    app.get(&restaurant_admin_token(Uuid::new_v4()), "/api/v1/orders/plan")
        .await;

    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body = response.text().await.unwrap();
    assert!(body.contains("subscription_activations_total"));
}
