//! Relay API client and toggle behavior against a mock primary plane.

use modbusbackup::relay::{RelayClient, RelayError, ToggleCoordinator, ToggleOutcome};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, RelayClient) {
    let server = MockServer::start().await;
    let client = RelayClient::new(reqwest::Client::new(), format!("{}/json/", server.uri()));
    (server, client)
}

async fn mount_state(server: &MockServer, relay: &str, value: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/json/relay/{}", relay)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "value": value } })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_read_state() {
    let (server, client) = setup().await;
    mount_state(&server, "2_16", json!(1)).await;
    mount_state(&server, "2_17", json!(0)).await;

    assert!(client.read_state("2_16").await.unwrap());
    assert!(!client.read_state("2_17").await.unwrap());
}

#[tokio::test]
async fn test_toggle_off_to_on() {
    let (server, client) = setup().await;
    mount_state(&server, "2_16", json!(0)).await;

    Mock::given(method("POST"))
        .and(path("/json/relay/2_16"))
        .and(body_json(json!({ "value": "1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ToggleCoordinator::new(client).toggle("2_16").await;
    assert_eq!(
        outcome,
        ToggleOutcome::Toggled {
            from: false,
            to: true
        }
    );
}

#[tokio::test]
async fn test_toggle_on_to_off() {
    let (server, client) = setup().await;
    mount_state(&server, "1_01", json!(1)).await;

    Mock::given(method("POST"))
        .and(path("/json/relay/1_01"))
        .and(body_json(json!({ "value": "0" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ToggleCoordinator::new(client).toggle("1_01").await;
    assert_eq!(
        outcome,
        ToggleOutcome::Toggled {
            from: true,
            to: false
        }
    );
}

#[tokio::test]
async fn test_read_failure_skips_write() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.read_state("2_16").await;
    assert!(
        matches!(result, Err(RelayError::Status { .. })),
        "expected Status error, got: {result:?}"
    );

    let outcome = ToggleCoordinator::new(client).toggle("2_16").await;
    assert_eq!(outcome, ToggleOutcome::ReadFailed);
}

#[tokio::test]
async fn test_write_failure_reported() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "value": 0 } })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ToggleCoordinator::new(client).toggle("2_16").await;
    assert_eq!(outcome, ToggleOutcome::WriteFailed);
}

#[tokio::test]
async fn test_missing_value_field() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let result = client.read_state("2_16").await;
    assert!(matches!(result, Err(RelayError::MissingField)));
}

#[tokio::test]
async fn test_malformed_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let result = client.read_state("2_16").await;
    assert!(matches!(result, Err(RelayError::Body(_))));
}

#[tokio::test]
async fn test_concurrent_toggles_of_one_relay_serialize() {
    let (server, client) = setup().await;

    // Every read sees the relay off; each toggle must still issue its own read and write.
    mount_state(&server, "2_16", json!(0)).await;
    Mock::given(method("POST"))
        .and(path("/json/relay/2_16"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let coordinator = Arc::new(ToggleCoordinator::new(client));
    let (a, b) = tokio::join!(coordinator.toggle("2_16"), coordinator.toggle("2_16"));

    assert!(matches!(a, ToggleOutcome::Toggled { .. }));
    assert!(matches!(b, ToggleOutcome::Toggled { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}
