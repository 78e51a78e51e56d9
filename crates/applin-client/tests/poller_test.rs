#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Background poller behavior:
//! - backoff 1s, 5s, 10s, 30s, 30s... after failures, reset by a success
//! - only due `poll_seconds` pages are fetched, top of the stack first
//! - a response older than a newer local write is dropped
//! - failures are logged, not shown

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use applin_client::context::{ClientContext, ContextBuilder};
use applin_client::executor::ActionExecutor;
use applin_client::mock::{MockPlatform, MockReply, MockTransport};
use applin_client::poller::BackgroundPoller;
use applin_client::transport::Method;
use applin_core::action::ActionSpec;
use applin_core::clock::ManualWallClock;
use applin_core::spec::PageSpec;
use applin_core::static_pages::{LOADING_PAGE_KEY, SERVER_ERROR_PAGE_KEY};

// ── Helpers ──

fn polling_page(title: &str, seconds: u64) -> serde_json::Value {
    json!({"typ": "nav_page", "title": title, "poll_seconds": seconds})
}

struct Harness {
    transport: Arc<MockTransport>,
    wall: Arc<ManualWallClock>,
    ctx: Arc<ClientContext>,
}

/// Load `pages` (bottom first) through the executor with the wall clock at
/// 1000s.
async fn loaded(transport: MockTransport, pages: &[&str]) -> Harness {
    let transport = Arc::new(transport);
    let wall = Arc::new(ManualWallClock::new(1000));
    let ctx = ContextBuilder::new(
        "http://server.test",
        transport.clone(),
        Arc::new(MockPlatform::new()),
    )
    .wall_clock(wall.clone())
    .build();

    let mut actions = vec![ActionSpec::replace_all(pages[0])];
    actions.extend(pages[1..].iter().map(|p| ActionSpec::push(*p)));
    let executor = ActionExecutor::new(ctx.clone());
    assert!(executor.do_actions(LOADING_PAGE_KEY, actions).await);

    Harness {
        transport,
        wall,
        ctx,
    }
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

async fn count_at(h: &Harness, start: Instant, millis: u64, path: &str) -> usize {
    tokio::time::sleep_until(start + Duration::from_millis(millis)).await;
    settle().await;
    h.transport.requests_to(path).len()
}

fn title_of(ctx: &ClientContext, key: &str) -> Option<String> {
    ctx.state
        .read_only(|s| s.spec(key).and_then(|spec| spec.title().map(str::to_string)))
}

// ── Backoff ──

#[tokio::test(start_paused = true)]
async fn failures_back_off_then_success_resets() {
    let h = loaded(
        MockTransport::new()
            .with_reply("/feed", MockReply::page(polling_page("Feed", 5)))
            .with_reply("/feed", MockReply::status(500, "down")),
        &["/feed"],
    )
    .await;
    h.wall.advance(100);
    let loads = h.transport.requests_to("/feed").len();

    let cancel = CancellationToken::new();
    let start = Instant::now();
    let task = BackgroundPoller::new(h.ctx.clone()).spawn(cancel.clone());

    // Polls land at 1s, then +5s, +10s, +30s, +30s.
    let expected = [
        (999, 0),
        (1_001, 1),
        (5_999, 1),
        (6_001, 2),
        (15_999, 2),
        (16_001, 3),
        (45_999, 3),
        (46_001, 4),
        (75_999, 4),
        (76_001, 5),
    ];
    for (millis, polls) in expected {
        assert_eq!(
            count_at(&h, start, millis, "/feed").await - loads,
            polls,
            "at {millis}ms"
        );
    }

    h.transport
        .set_reply("/feed", MockReply::page(polling_page("Feed", 5)));
    assert_eq!(count_at(&h, start, 106_001, "/feed").await - loads, 6);
    h.wall.advance(100);
    assert_eq!(count_at(&h, start, 106_999, "/feed").await - loads, 6);
    assert_eq!(count_at(&h, start, 107_001, "/feed").await - loads, 7);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failures_are_not_shown_to_the_user() {
    let h = loaded(
        MockTransport::new()
            .with_reply("/feed", MockReply::page(polling_page("Feed", 5)))
            .with_reply("/feed", MockReply::status(500, "down")),
        &["/feed"],
    )
    .await;
    h.wall.advance(100);

    let result = BackgroundPoller::new(h.ctx.clone())
        .poll_once(&CancellationToken::new())
        .await;

    assert!(result.is_err());
    assert_eq!(h.ctx.page_keys(), vec!["/feed".to_string()]);
    assert!(h.ctx.errors.last().is_none());
}

// ── Which pages are polled ──

#[tokio::test(start_paused = true)]
async fn fresh_pages_wait_for_their_interval() {
    let h = loaded(
        MockTransport::new().with_page("/feed", polling_page("Feed", 5)),
        &["/feed"],
    )
    .await;
    let poller = BackgroundPoller::new(h.ctx.clone());
    let cancel = CancellationToken::new();

    h.wall.advance(4);
    assert_eq!(poller.poll_once(&cancel).await.unwrap(), 0);

    h.wall.advance(1);
    assert_eq!(poller.poll_once(&cancel).await.unwrap(), 1);

    // The refresh restamped the page.
    assert_eq!(poller.poll_once(&cancel).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_polling_and_static_pages_are_skipped() {
    let h = loaded(
        MockTransport::new().with_page("/plain", json!({"typ": "nav_page", "title": "Plain"})),
        &["/plain", SERVER_ERROR_PAGE_KEY],
    )
    .await;
    h.wall.advance(10_000);
    let before = h.transport.request_count();

    let fetched = BackgroundPoller::new(h.ctx.clone())
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fetched, 0);
    assert_eq!(h.transport.request_count(), before);
}

#[tokio::test(start_paused = true)]
async fn stack_is_polled_top_first_and_stops_at_first_error() {
    let h = loaded(
        MockTransport::new()
            .with_page("/a", polling_page("A", 1))
            .with_reply("/b", MockReply::page(polling_page("B", 1)))
            .with_reply("/b", MockReply::error(
                applin_client::transport::TransportError::Timeout("slow".into()),
            )),
        &["/a", "/b"],
    )
    .await;
    h.wall.advance(10);
    let before = h.transport.request_count();

    let result = BackgroundPoller::new(h.ctx.clone())
        .poll_once(&CancellationToken::new())
        .await;

    assert!(result.is_err());
    let polled: Vec<String> = h.transport.requests()[before..]
        .iter()
        .map(|r| applin_client::mock::url_path(&r.url))
        .collect();
    assert_eq!(polled, vec!["/b".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn background_fetch_sends_page_vars() {
    let form = json!({
        "typ": "nav_page",
        "title": "Search",
        "poll_seconds": 2,
        "widget": {"typ": "textfield", "var_name": "q"}
    });
    let h = loaded(MockTransport::new().with_page("/search", form), &["/search"]).await;
    h.ctx.vars.set_string("q", "rust");
    h.wall.advance(2);

    BackgroundPoller::new(h.ctx.clone())
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();

    let last = h.transport.requests_to("/search").pop().unwrap();
    assert_eq!(last.method, Method::Post);
    let body: serde_json::Value = serde_json::from_slice(last.body.as_ref().unwrap()).unwrap();
    assert_eq!(body, json!({"q": "rust"}));
}

// ── Stale responses ──

#[tokio::test(start_paused = true)]
async fn response_older_than_local_write_is_dropped() {
    let h = loaded(
        MockTransport::new()
            .with_reply("/feed", MockReply::page(polling_page("Feed", 5)))
            .with_reply(
                "/feed",
                MockReply::envelope(json!({
                    "page": polling_page("From server", 5),
                    "vars": {"seen": true}
                }))
                .delayed(Duration::from_secs(2)),
            ),
        &["/feed"],
    )
    .await;
    h.wall.advance(10);

    let poller = Arc::new(BackgroundPoller::new(h.ctx.clone()));
    let in_flight = tokio::spawn({
        let poller = poller.clone();
        async move { poller.poll_once(&CancellationToken::new()).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    let local = PageSpec::from_json(polling_page("Edited locally", 5)).unwrap();
    assert!(h.ctx.state.mutate_and_notify(|s| s.set("/feed", local)));

    assert_eq!(in_flight.await.unwrap().unwrap(), 1);
    assert_eq!(title_of(&h.ctx, "/feed").as_deref(), Some("Edited locally"));
    assert!(h.ctx.vars.get("seen").is_none());
}

#[tokio::test(start_paused = true)]
async fn response_is_applied_when_nothing_changed_meanwhile() {
    let h = loaded(
        MockTransport::new()
            .with_reply("/feed", MockReply::page(polling_page("Feed", 5)))
            .with_reply(
                "/feed",
                MockReply::page(polling_page("Fresh", 5)).delayed(Duration::from_secs(2)),
            ),
        &["/feed"],
    )
    .await;
    h.wall.advance(10);

    BackgroundPoller::new(h.ctx.clone())
        .poll_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(title_of(&h.ctx, "/feed").as_deref(), Some("Fresh"));
}

// ── Shutdown ──

#[tokio::test(start_paused = true)]
async fn cancelled_poller_exits() {
    let h = loaded(
        MockTransport::new().with_page("/feed", polling_page("Feed", 5)),
        &["/feed"],
    )
    .await;
    let cancel = CancellationToken::new();
    let task = BackgroundPoller::new(h.ctx.clone()).spawn(cancel.clone());

    cancel.cancel();
    task.await.unwrap();
    let before = h.transport.request_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.request_count(), before);
}

#[tokio::test(start_paused = true)]
async fn cancel_abandons_request_in_flight() {
    let h = loaded(
        MockTransport::new()
            .with_reply("/feed", MockReply::page(polling_page("Feed", 5)))
            .with_reply(
                "/feed",
                MockReply::page(polling_page("Late", 5)).delayed(Duration::from_secs(25)),
            ),
        &["/feed"],
    )
    .await;
    h.wall.advance(10);
    let cancel = CancellationToken::new();
    let task = BackgroundPoller::new(h.ctx.clone()).spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(h.transport.requests_to("/feed").len(), 2);
    let cancelled_at = Instant::now();
    cancel.cancel();
    task.await.unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_millis(10));
    assert_eq!(title_of(&h.ctx, "/feed").as_deref(), Some("Feed"));
}
