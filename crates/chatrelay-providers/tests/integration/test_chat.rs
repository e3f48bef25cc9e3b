//! Integration tests for the chat messaging sink

use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatrelay_core::domain::ChannelName;
use chatrelay_core::ports::{IMessagingSink, RenderedMessage};
use chatrelay_providers::chat::ChatSink;

use crate::common;

fn channel(name: &str) -> ChannelName {
    ChannelName::new(name.to_string()).unwrap()
}

#[tokio::test]
async fn test_post_message() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_json(serde_json::json!({
            "channel": "acme-chan",
            "text": "hello"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "ts": "1.2"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = ChatSink::new(client);
    sink.send(&channel("#acme-chan"), &RenderedMessage::new("hello"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ok_false_is_failure() {
    let (server, client) = common::setup().await;
    common::mount_json(
        &server,
        "POST",
        "/chat.postMessage",
        200,
        serde_json::json!({"ok": false, "error": "channel_not_found"}),
    )
    .await;

    let sink = ChatSink::new(client);
    let err = sink
        .send(&channel("nowhere"), &RenderedMessage::new("hello"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("channel_not_found"));
}

#[tokio::test]
async fn test_http_error_is_failure() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = ChatSink::new(client);
    let result = sink
        .send(&channel("general"), &RenderedMessage::new("hello"))
        .await;
    assert!(result.is_err());
}
