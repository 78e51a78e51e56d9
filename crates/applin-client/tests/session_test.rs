#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Session startup, restore, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use applin_client::context::ContextBuilder;
use applin_client::mock::{MockPlatform, MockReply, MockTransport, RecordingRenderer};
use applin_client::Session;
use applin_core::clock::ManualWallClock;
use applin_core::snapshot::StateSnapshot;
use applin_core::static_pages::LOADING_PAGE_KEY;

// ── Helpers ──

fn page(title: &str) -> serde_json::Value {
    json!({"typ": "nav_page", "title": title})
}

fn session(transport: MockTransport) -> (Arc<MockTransport>, Arc<RecordingRenderer>, Session) {
    let transport = Arc::new(transport);
    let ctx = ContextBuilder::new(
        "http://server.test",
        transport.clone(),
        Arc::new(MockPlatform::new()),
    )
    .home_page_key("/home")
    .build();
    let session = Session::new(ctx);
    let renderer = Arc::new(RecordingRenderer::new());
    session.set_renderer(renderer.clone());
    (transport, renderer, session)
}

fn keys(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Startup ──

#[tokio::test(start_paused = true)]
async fn fresh_start_replaces_loading_page_with_home() {
    let (_, renderer, session) = session(MockTransport::new().with_page("/home", page("Home")));

    assert!(session.start(None).await);

    assert_eq!(
        renderer.renders(),
        vec![keys(&[LOADING_PAGE_KEY]), keys(&["/home"])]
    );
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn second_start_is_ignored() {
    let (transport, _, session) = session(
        MockTransport::new().with_page("/home", json!({"title": "Home", "poll_seconds": 1})),
    );
    assert!(session.start(None).await);

    assert!(!session.start(None).await);
    assert_eq!(transport.requests_to("/home").len(), 1);
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn snapshot_restores_vars_and_stack() {
    let (_, _, session) = session(
        MockTransport::new()
            .with_page("/home", page("Home"))
            .with_page("/inbox", page("Inbox")),
    );
    let mut snapshot = StateSnapshot::default();
    snapshot.string_vars.insert("draft".into(), "hi".into());
    snapshot.page_keys = keys(&["/home", "/inbox"]);

    assert!(session.start(Some(snapshot)).await);

    assert_eq!(session.context().page_keys(), keys(&["/home", "/inbox"]));
    assert_eq!(
        session.context().vars.get_string("draft").as_deref(),
        Some("hi")
    );
    assert_eq!(session.snapshot().page_keys, keys(&["/home", "/inbox"]));
    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unrestorable_stack_falls_back_to_home() {
    let (_, _, session) = session(
        MockTransport::new()
            .with_page("/home", page("Home"))
            .with_reply("/gone", MockReply::status(404, "")),
    );
    let snapshot = StateSnapshot {
        page_keys: keys(&["/home", "/gone"]),
        ..StateSnapshot::default()
    };

    assert!(session.start(Some(snapshot)).await);
    assert_eq!(session.context().page_keys(), keys(&["/home"]));
    session.shutdown().await;
}

// ── Shutdown ──

#[tokio::test(start_paused = true)]
async fn shutdown_stops_background_polling() {
    let (transport, _, session) = session(
        MockTransport::new().with_page("/home", json!({"title": "Home", "poll_seconds": 1})),
    );
    assert!(session.start(None).await);

    session.shutdown().await;
    assert!(session.is_shut_down());
    let before = transport.request_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.request_count(), before);
}

#[tokio::test(start_paused = true)]
async fn shutdown_does_not_wait_for_background_request() {
    let transport = Arc::new(
        MockTransport::new()
            .with_page("/home", json!({"title": "Home", "poll_seconds": 1}))
            .with_reply(
                "/home",
                MockReply::page(json!({"title": "Late", "poll_seconds": 1}))
                    .delayed(Duration::from_secs(25)),
            ),
    );
    let wall = Arc::new(ManualWallClock::new(1000));
    let ctx = ContextBuilder::new(
        "http://server.test",
        transport.clone(),
        Arc::new(MockPlatform::new()),
    )
    .wall_clock(wall.clone())
    .home_page_key("/home")
    .build();
    let session = Session::new(ctx);
    assert!(session.start(None).await);
    wall.advance(5);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(transport.requests_to("/home").len(), 2);
    let started = tokio::time::Instant::now();
    session.shutdown().await;

    assert!(started.elapsed() < Duration::from_millis(10));
    assert!(session.is_shut_down());
}

#[tokio::test(start_paused = true)]
async fn foreground_poller_stops_with_session() {
    let (transport, _, session) = session(MockTransport::new().with_page("/home", page("Home")));
    assert!(session.start(None).await);
    let poller = session.foreground_poller();

    let task = poller.schedule("/home", Duration::from_secs(1));
    session.shutdown().await;

    assert!(!task.await.unwrap());
    assert_eq!(transport.requests_to("/home").len(), 1);
}
