//! Integration tests for the storage change feed

use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatrelay_core::domain::{Cursor, FeedId, RawChangeEntry};
use chatrelay_core::ports::{FetchError, IChangeFeed};
use chatrelay_providers::storage::StorageChangeFeed;

use crate::common;

fn cursor(s: &str) -> Cursor {
    Cursor::new(s.to_string()).unwrap()
}

#[tokio::test]
async fn test_bootstrap_lists_root_recursively() {
    let (server, client) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .and(body_partial_json(serde_json::json!({
            "path": "",
            "recursive": true,
            "include_deleted": true,
            "limit": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                common::file_json("id:f1", "/Clients/Acme/invoice.pdf"),
                {".tag": "folder", "id": "id:d1", "name": "Acme", "path_display": "/Clients/Acme"},
                {".tag": "deleted", "name": "old.txt", "path_lower": "/old.txt"}
            ],
            "cursor": "cursor-1",
            "has_more": true
        })))
        .mount(&server)
        .await;

    let feed = StorageChangeFeed::new(client, "", 100);
    assert_eq!(feed.feed_id(), &FeedId::storage());

    let page = feed.fetch_page(None).await.unwrap();
    assert_eq!(page.next_cursor, cursor("cursor-1"));
    assert!(page.has_more);
    assert_eq!(page.entries.len(), 3);

    match &page.entries[0] {
        RawChangeEntry::File(f) => {
            assert_eq!(f.id, "id:f1");
            assert_eq!(f.name, "invoice.pdf");
            assert_eq!(f.path, "/Clients/Acme/invoice.pdf");
            assert_eq!(f.size, 2048);
            assert_eq!(f.content_hash.as_deref(), Some("abc123"));
        }
        other => panic!("expected file, got {:?}", other),
    }
    assert!(matches!(&page.entries[1], RawChangeEntry::Folder(f) if f.path == "/Clients/Acme"));
    assert!(matches!(&page.entries[2], RawChangeEntry::Deletion(d) if d.path == "/old.txt"));
}

#[tokio::test]
async fn test_continue_uses_cursor_and_skips_unknown_tags() {
    let (server, client) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/continue"))
        .and(body_partial_json(serde_json::json!({ "cursor": "cursor-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [
                {".tag": "shared_link", "url": "https://x"},
                common::file_json("id:f2", "/notes.md")
            ],
            "cursor": "cursor-2",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = StorageChangeFeed::new(client, "", 100);
    let page = feed.fetch_page(Some(&cursor("cursor-1"))).await.unwrap();

    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.next_cursor, cursor("cursor-2"));
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_reset_conflict_is_cursor_expired() {
    let (server, client) = common::setup().await;
    common::mount_json(
        &server,
        "POST",
        "/files/list_folder/continue",
        409,
        serde_json::json!({"error_summary": "reset/..", "error": {".tag": "reset"}}),
    )
    .await;

    let feed = StorageChangeFeed::new(client, "", 100);
    let err = feed.fetch_page(Some(&cursor("stale"))).await.unwrap_err();
    assert!(matches!(err, FetchError::CursorExpired(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unauthorized_and_rate_limited() {
    let (server, client) = common::setup().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_access_token"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let feed = StorageChangeFeed::new(client, "", 100);

    let err = feed.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized(_)), "got {:?}", err);

    let err = feed.fetch_page(None).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let feed = StorageChangeFeed::new(client, "", 100);
    let err = feed.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetchError::Transient(_)), "got {:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let feed = StorageChangeFeed::new(client, "", 100);
    let err = feed.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidResponse(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_entity_details_from_metadata() {
    let (server, client) = common::setup().await;
    let mut metadata = common::file_json("id:f1", "/Clients/Acme/invoice.pdf");
    metadata["preview_url"] = serde_json::json!("https://storage.example/preview/f1");
    common::mount_json(&server, "POST", "/files/get_metadata", 200, metadata).await;

    let feed = StorageChangeFeed::new(client, "", 100);
    let details = feed.entity_details("id:f1").await.unwrap();

    assert_eq!(details.url.as_deref(), Some("https://storage.example/preview/f1"));
    assert_eq!(
        details.description.as_deref(),
        Some("/Clients/Acme/invoice.pdf (2048 bytes)")
    );
}
