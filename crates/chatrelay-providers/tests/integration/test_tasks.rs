//! Integration tests for the task activity feed and task directory

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use chatrelay_core::domain::{Cursor, RawChangeEntry, StatusKind, TaskChangeKind};
use chatrelay_core::ports::{FetchError, IChangeFeed, ITaskDirectory};
use chatrelay_providers::tasks::TaskChangeFeed;

use crate::common;

#[tokio::test]
async fn test_activity_page_maps_status_changes() {
    let (server, client) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/teams/42/activity"))
        .and(query_param("limit", "25"))
        .and(query_param("cursor", "act-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "events": [
                {
                    "task_id": "t-1",
                    "task_name": "Quarterly report",
                    "space": "Finance",
                    "date": "2026-10-16T08:00:00Z",
                    "field": "status",
                    "before": {"status": "in progress", "type": "custom"},
                    "after": {"status": "complete", "type": "closed"}
                },
                {
                    "task_id": "t-2",
                    "task_name": "Budget",
                    "space": "Finance",
                    "date": "2026-10-16T08:05:00Z",
                    "field": "due_date"
                }
            ],
            "cursor": "act-2",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let cursor = Cursor::new("act-1".to_string()).unwrap();
    let page = feed.fetch_page(Some(&cursor)).await.unwrap();

    assert_eq!(page.next_cursor.as_str(), "act-2");
    assert_eq!(page.entries.len(), 2);

    let RawChangeEntry::TaskChange(first) = &page.entries[0] else {
        panic!("expected task change");
    };
    assert!(first.is_completion());
    match &first.change {
        TaskChangeKind::Status { after, .. } => assert_eq!(after.kind, StatusKind::Closed),
        other => panic!("expected status change, got {:?}", other),
    }

    let RawChangeEntry::TaskChange(second) = &page.entries[1] else {
        panic!("expected task change");
    };
    assert!(!second.is_completion());
}

#[tokio::test]
async fn test_gone_is_cursor_expired() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/teams/42/activity"))
        .respond_with(ResponseTemplate::new(410).set_body_string("cursor too old"))
        .mount(&server)
        .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let cursor = Cursor::new("ancient".to_string()).unwrap();
    let err = feed.fetch_page(Some(&cursor)).await.unwrap_err();
    assert_eq!(err, FetchError::CursorExpired("cursor too old".to_string()));
}

#[tokio::test]
async fn test_forbidden_is_unauthorized() {
    let (server, client) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/teams/42/activity"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let err = feed.fetch_page(None).await.unwrap_err();
    assert!(matches!(err, FetchError::Unauthorized(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_entity_details() {
    let (server, client) = common::setup().await;
    common::mount_json(
        &server,
        "GET",
        "/tasks/t-1",
        200,
        serde_json::json!({
            "id": "t-1",
            "name": "Quarterly report",
            "status": {"status": "complete", "type": "closed"},
            "url": "https://tasks.example/t/t-1",
            "description": "  ",
            "assignees": [{"username": "ana"}, {"username": "luis"}]
        }),
    )
    .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let details = feed.entity_details("t-1").await.unwrap();

    assert_eq!(details.url.as_deref(), Some("https://tasks.example/t/t-1"));
    assert_eq!(details.description, None);
    assert_eq!(details.assignees, vec!["ana", "luis"]);
}

#[tokio::test]
async fn test_entity_details_escapes_id_in_path() {
    let (server, client) = common::setup().await;
    common::mount_json(
        &server,
        "GET",
        "/tasks/proj%2F7%3Fx",
        200,
        serde_json::json!({
            "id": "proj/7?x",
            "name": "Nested id",
            "status": {"status": "open", "type": "open"},
            "url": "https://tasks.example/t/proj-7",
            "assignees": []
        }),
    )
    .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let details = feed.entity_details("proj/7?x").await.unwrap();

    assert_eq!(details.url.as_deref(), Some("https://tasks.example/t/proj-7"));
}

#[tokio::test]
async fn test_directory_follows_pages() {
    let (server, client) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/teams/42/tasks"))
        .and(query_param("page", "0"))
        .and(query_param("space", "Finance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tasks": [
                {"id": "t-1", "name": "Report", "status": {"status": "complete", "type": "closed"}},
                {"id": "t-2", "name": "Budget", "status": {"status": "to do", "type": "open"}}
            ],
            "last_page": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/teams/42/tasks"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tasks": [
                {"id": "t-3", "name": "Audit", "status": {"status": "in review"}}
            ],
            "last_page": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = TaskChangeFeed::new(client, "42", 25);
    let tasks = feed.list_tasks(Some("Finance")).await.unwrap();

    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t-1", "t-2", "t-3"]);
    assert!(tasks[0].status.is_terminal());
    assert_eq!(tasks[2].status.kind, StatusKind::Custom);
}
