//! Integration tests for SyncLoop
//!
//! Each test assembles a loop from in-memory doubles (see `common`) and
//! checks cursor handling, classification and dispatch across whole runs.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Semaphore;

use chatrelay_core::domain::{FeedId, RunOutcome};
use chatrelay_core::ports::{FetchError, ICursorStore};
use chatrelay_sync::{SyncError, SyncOptions, SyncPhase};

use common::*;

// ============================================================================
// Cursor handling
// ============================================================================

#[tokio::test]
async fn run_advances_and_persists_cursor() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                page(vec![file("id:1", "/a.pdf", 1)], "c1", true),
                page(vec![file("id:2", "/b.pdf", 2)], "c2", false),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.dispatched, 2);
    assert!(summary.started_from_cursor);
    assert!(summary.cursor_advanced);
    assert_eq!(h.store.get(&feed), Some(cursor("c2")));

    // second page was requested with the first page's cursor
    let calls = h.feed.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![Some(cursor("c0")), Some(cursor("c1"))]);
}

#[tokio::test]
async fn failure_on_page_two_of_three_leaves_cursor_unchanged() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                page(vec![file("id:1", "/a.pdf", 1)], "c1", true),
                Err(FetchError::Transient("connection reset".to_string())),
                page(vec![file("id:3", "/c.pdf", 3)], "c3", false),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let err = h.sync_loop.run().await.unwrap_err();

    assert!(matches!(err, SyncError::TransientFetch(_)));
    assert_eq!(h.store.get(&feed), Some(cursor("c0")));
    assert_eq!(h.store.save_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(h.sync_loop.phase(), SyncPhase::Idle);

    let records = h.history.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, RunOutcome::Aborted);
    assert!(records[0].error.as_deref().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn unchanged_cursor_is_not_saved_again() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(feed.clone(), vec![page(vec![], "c0", false)]),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert!(!summary.cursor_advanced);
    assert_eq!(h.store.save_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cursor_save_failing_once_then_succeeding_completes_run() {
    let feed = FeedId::storage();
    let store = MemoryCursorStore::with_cursor(&feed, "c0");
    store.failing_saves.store(1, Ordering::SeqCst);
    let h = harness(
        ScriptedFeed::new(feed.clone(), vec![page(vec![], "c1", false)]),
        store,
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert!(summary.cursor_advanced);
    assert_eq!(h.store.save_attempts.load(Ordering::SeqCst), 2);
    assert_eq!(h.store.get(&feed), Some(cursor("c1")));
}

#[tokio::test]
async fn cursor_save_failing_twice_fails_run() {
    let feed = FeedId::storage();
    let store = MemoryCursorStore::with_cursor(&feed, "c0");
    store.failing_saves.store(2, Ordering::SeqCst);
    let h = harness(
        ScriptedFeed::new(feed.clone(), vec![page(vec![], "c1", false)]),
        store,
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let err = h.sync_loop.run().await.unwrap_err();
    assert!(matches!(err, SyncError::CursorStore(_)));
    assert_eq!(h.store.get(&feed), Some(cursor("c0")));
}

#[tokio::test]
async fn slower_run_over_shared_store_cannot_rewind_cursor() {
    let feed = FeedId::storage();
    let store = Arc::new(MemoryCursorStore::with_cursor(&feed, "c0"));

    // the slow loop blocks inside its first fetch until released
    let gate = Arc::new(Semaphore::new(0));
    let mut slow_feed = ScriptedFeed::new(
        feed.clone(),
        vec![page(vec![file("id:1", "/a.pdf", 1)], "c1", false)],
    );
    slow_feed.gate = Some(gate.clone());
    let slow = harness_with_store(
        slow_feed,
        store.clone(),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );
    let fast = harness_with_store(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(
                vec![file("id:1", "/a.pdf", 1), file("id:2", "/b.pdf", 2)],
                "c2",
                false,
            )],
        ),
        store.clone(),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let entered = slow.feed.entered.clone();
    let slow_loop = slow.sync_loop;
    let slow_run = tokio::spawn(async move { slow_loop.run().await });
    entered.notified().await;

    // a second loop on the same feed finishes first
    let summary = fast.sync_loop.run().await.unwrap();
    assert!(summary.cursor_advanced);
    assert_eq!(store.get(&feed), Some(cursor("c2")));

    gate.add_permits(1);
    let err = slow_run.await.unwrap().unwrap_err();

    assert!(matches!(err, SyncError::CursorStore(ref m) if m.contains("changed by another run")));
    assert_eq!(store.get(&feed), Some(cursor("c2")));
    // conflicts are not retried: one save per loop
    assert_eq!(store.save_attempts.load(Ordering::SeqCst), 2);

    let records = slow.history.records.lock().unwrap();
    assert_eq!(records[0].outcome, RunOutcome::Aborted);
}

#[tokio::test]
async fn reset_during_run_is_not_undone() {
    let feed = FeedId::storage();
    let store = Arc::new(MemoryCursorStore::with_cursor(&feed, "c0"));
    let gate = Arc::new(Semaphore::new(0));
    let mut scripted = ScriptedFeed::new(feed.clone(), vec![page(vec![], "c1", false)]);
    scripted.gate = Some(gate.clone());
    let h = harness_with_store(
        scripted,
        store.clone(),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let entered = h.feed.entered.clone();
    let sync_loop = h.sync_loop;
    let run = tokio::spawn(async move { sync_loop.run().await });
    entered.notified().await;

    assert!(store.reset(&feed).await.unwrap());
    gate.add_permits(1);

    assert!(matches!(
        run.await.unwrap().unwrap_err(),
        SyncError::CursorStore(_)
    ));
    assert_eq!(store.get(&feed), None);
}

#[tokio::test]
async fn bootstrap_save_conflicts_with_cursor_written_meanwhile() {
    let feed = FeedId::storage();
    let store = Arc::new(MemoryCursorStore::default());
    let gate = Arc::new(Semaphore::new(0));
    let mut scripted = ScriptedFeed::new(feed.clone(), vec![page(vec![], "b1", false)]);
    scripted.gate = Some(gate.clone());
    let h = harness_with_store(
        scripted,
        store.clone(),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let entered = h.feed.entered.clone();
    let sync_loop = h.sync_loop;
    let run = tokio::spawn(async move { sync_loop.run().await });
    entered.notified().await;

    store.save(&feed, None, &cursor("other")).await.unwrap();
    gate.add_permits(1);

    assert!(run.await.unwrap().is_err());
    assert_eq!(store.get(&feed), Some(cursor("other")));
}

#[tokio::test]
async fn expired_cursor_and_auth_errors_are_distinct() {
    let feed = FeedId::tasks();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                Err(FetchError::CursorExpired("cursor too old".to_string())),
                Err(FetchError::Unauthorized("token revoked".to_string())),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let first = h.sync_loop.run().await.unwrap_err();
    assert!(matches!(first, SyncError::CursorExpired { ref feed, .. } if feed.as_str() == "tasks"));

    let second = h.sync_loop.run().await.unwrap_err();
    assert!(matches!(second, SyncError::Auth(_)));

    // neither run touched the stored cursor
    assert_eq!(h.store.get(&feed), Some(cursor("c0")));
}

#[tokio::test]
async fn non_advancing_provider_aborts_instead_of_spinning() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                page(vec![], "c1", true),
                page(vec![], "c1", true),
                page(vec![], "c2", false),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let err = h.sync_loop.run().await.unwrap_err();
    assert!(matches!(err, SyncError::TransientFetch(_)));
    assert_eq!(h.feed.call_count(), 2);
}

// ============================================================================
// Classification and dispatch
// ============================================================================

#[tokio::test]
async fn duplicate_across_pages_dispatched_once() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                page(vec![file("id:1", "/a.pdf", 1), folder("/x")], "c1", true),
                page(vec![file("id:1", "/a.pdf", 1)], "c2", false),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.classified, 1);
    assert_eq!(summary.dispatched, 1);
    assert_eq!(h.sink.texts(), vec!["id:1".to_string()]);
}

#[tokio::test]
async fn dispatch_failure_does_not_block_later_dispatches() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![
                page(
                    vec![
                        file("id:1", "/dead/a.pdf", 1),
                        file("id:2", "/clients/b.pdf", 2),
                    ],
                    "c1",
                    true,
                ),
                page(vec![file("id:3", "/clients/c.pdf", 3)], "c2", false),
            ],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[("/dead", "broken"), ("/clients", "clients")], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();

    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].subject_id, "id:1");
    assert_eq!(summary.failures[0].channel.as_str(), "broken");
    assert!(summary.failures[0].reason.contains("channel_not_found"));
    // dispatch failures do not hold the cursor back
    assert_eq!(h.store.get(&feed), Some(cursor("c2")));

    let records = h.history.records.lock().unwrap();
    assert_eq!(records[0].outcome, RunOutcome::CompletedWithFailures);
}

#[tokio::test]
async fn routing_sends_each_candidate_to_longest_prefix() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(
                vec![
                    file("id:1", "/clients/acme/invoice.pdf", 1),
                    file("id:2", "/clients/other/x.pdf", 2),
                    file("id:3", "/unmatched/y.pdf", 3),
                ],
                "c1",
                false,
            )],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(
            &[("/clients/acme", "acme-chan"), ("/clients", "general-chan")],
            "all-media",
        ),
        &[],
        SyncOptions::default(),
    );

    h.sync_loop.run().await.unwrap();

    let mut sent = h.sink.sent.lock().unwrap().clone();
    sent.sort();
    assert_eq!(
        sent,
        vec![
            ("acme-chan".to_string(), "id:1".to_string()),
            ("all-media".to_string(), "id:3".to_string()),
            ("general-chan".to_string(), "id:2".to_string()),
        ]
    );
}

#[tokio::test]
async fn allow_list_restricts_notifications() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(
                vec![
                    file("id:1", "/clients/lst/a.pdf", 1),
                    file("id:2", "/clients/other/b.pdf", 2),
                ],
                "c1",
                false,
            )],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &["/Clients/LST"],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert_eq!(summary.classified, 1);
    assert_eq!(h.sink.texts(), vec!["id:1".to_string()]);
}

// ============================================================================
// Bootstrap and enrichment
// ============================================================================

#[tokio::test]
async fn bootstrap_run_suppresses_notifications_by_default() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(
                vec![file("id:1", "/a.pdf", 1), file("id:2", "/b.pdf", 2)],
                "c1",
                false,
            )],
        ),
        MemoryCursorStore::default(),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );

    let summary = h.sync_loop.run().await.unwrap();

    assert!(summary.is_bootstrap());
    assert_eq!(summary.classified, 2);
    assert_eq!(summary.suppressed, 2);
    assert_eq!(summary.dispatched, 0);
    assert!(h.sink.texts().is_empty());
    assert_eq!(h.store.get(&feed), Some(cursor("c1")));
    assert_eq!(h.feed.calls.lock().unwrap()[0], None);
}

#[tokio::test]
async fn bootstrap_run_dispatches_when_enabled() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(vec![file("id:1", "/a.pdf", 1)], "c1", false)],
        ),
        MemoryCursorStore::default(),
        routes(&[], "general"),
        &[],
        notify_always(),
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert_eq!(summary.suppressed, 0);
    assert_eq!(summary.dispatched, 1);
}

#[tokio::test]
async fn completed_tasks_are_enriched_before_dispatch() {
    let feed = FeedId::tasks();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(vec![task_closed("t1", "Marketing", 1)], "c1", false)],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[("marketing", "mkt")], "general"),
        &[],
        SyncOptions {
            notify_on_bootstrap: false,
            enrich_candidates: true,
        },
    );

    h.sync_loop.run().await.unwrap();
    let sent = h.sink.sent.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![("mkt".to_string(), "t1 https://tasks.test/t/t1".to_string())]
    );
}

#[tokio::test]
async fn enrichment_failure_still_dispatches() {
    let feed = FeedId::tasks();
    let mut scripted = ScriptedFeed::new(
        feed.clone(),
        vec![page(vec![task_closed("t1", "Marketing", 1)], "c1", false)],
    );
    scripted.details_fail = true;
    let h = harness(
        scripted,
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions {
            notify_on_bootstrap: false,
            enrich_candidates: true,
        },
    );

    let summary = h.sync_loop.run().await.unwrap();
    assert_eq!(summary.dispatched, 1);
    assert_eq!(h.sink.texts(), vec!["t1".to_string()]);
}

// ============================================================================
// Phases
// ============================================================================

#[tokio::test]
async fn phase_returns_to_idle_and_is_observable() {
    let feed = FeedId::storage();
    let h = harness(
        ScriptedFeed::new(
            feed.clone(),
            vec![page(vec![file("id:1", "/a.pdf", 1)], "c1", false)],
        ),
        MemoryCursorStore::with_cursor(&feed, "c0"),
        routes(&[], "general"),
        &[],
        SyncOptions::default(),
    );
    let mut phases = h.sync_loop.subscribe_phase();
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);

    h.sync_loop.run().await.unwrap();

    // the receiver saw at least one change and ends at Idle
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);
    assert_eq!(h.sync_loop.phase(), SyncPhase::Idle);
}
