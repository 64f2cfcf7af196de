//! The reqwest transport against a local mock server.

use network_client::logging::NoopLogger;
use network_client::{
    ErrorKind, HttpTransport, HttpTransportConfig, NetworkClient, Request, TransportError,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

fn http_client() -> NetworkClient {
    let transport = HttpTransport::with_config(
        HttpTransportConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("network-client-tests"),
    )
    .unwrap();
    NetworkClient::builder()
        .transport(Arc::new(transport))
        .logger(Arc::new(NoopLogger))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_decodes_json() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/users/1")
        .match_header("user-agent", "network-client-tests")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-request-id", "req-1")
        .with_body(r#"{"id":1,"name":"ada"}"#)
        .create_async()
        .await;

    let resp = http_client()
        .get::<User>(&format!("{}/users/1", server.url()))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(resp.header("X-Request-Id"), Some("req-1"));
    assert_eq!(
        resp.into_item(),
        User {
            id: 1,
            name: "ada".into()
        }
    );
}

#[tokio::test]
async fn test_concurrent_gets_hit_server_once() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/feed")
        .with_status(200)
        .with_body("fresh")
        .expect(1)
        .create_async()
        .await;
    let client = http_client();
    let url = format!("{}/feed", server.url());

    let (a, b, c) = tokio::join!(
        client.get::<String>(&url),
        client.get::<String>(&url),
        client.get::<String>(&url)
    );

    mock.assert_async().await;
    for resp in [a, b, c] {
        assert_eq!(resp.unwrap().into_item(), "fresh");
    }
}

#[tokio::test]
async fn test_post_json_body_is_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/users")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::Json(
            serde_json::json!({"id": 2, "name": "grace"}),
        ))
        .with_status(201)
        .with_body(r#"{"id":2,"name":"grace"}"#)
        .create_async()
        .await;

    let request = Request::parse(Method::POST, &format!("{}/users", server.url()))
        .unwrap()
        .with_json(&User {
            id: 2,
            name: "grace".into(),
        })
        .unwrap();
    let resp = http_client().fetch_as::<User>(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.status().as_u16(), 201);
    assert_eq!(resp.item().name, "grace");
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body(r#"{"code":"not_found"}"#)
        .create_async()
        .await;

    let err = http_client()
        .get::<User>(&format!("{}/missing", server.url()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.status_code().map(|s| s.as_u16()), Some(404));
    assert_eq!(err.api_body().unwrap().as_ref(), br#"{"code":"not_found"}"#);
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    // Port 9 (discard) on localhost is not expected to accept connections.
    let err = http_client()
        .get::<String>("http://127.0.0.1:9/")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(matches!(
        err,
        network_client::Error::Transport(TransportError::Http(_) | TransportError::Timeout)
    ));
}
