//! Shared mock-server setup for provider integration tests

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatrelay_providers::client::ApiClient;

pub const TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a client pointed at it
pub async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::new(TOKEN, server.uri());
    (server, client)
}

/// Mounts a JSON response for an authenticated request
pub async fn mount_json(
    server: &MockServer,
    http_method: &str,
    endpoint: &str,
    status: u16,
    body: serde_json::Value,
) {
    Mock::given(method(http_method))
        .and(path(endpoint))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub fn file_json(id: &str, path_display: &str) -> serde_json::Value {
    serde_json::json!({
        ".tag": "file",
        "id": id,
        "name": path_display.rsplit('/').next().unwrap_or(path_display),
        "path_display": path_display,
        "path_lower": path_display.to_lowercase(),
        "server_modified": "2026-10-16T10:00:00Z",
        "content_hash": "abc123",
        "size": 2048
    })
}
