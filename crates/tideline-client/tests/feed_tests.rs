//! End-to-end tests for the feed driver.
//!
//! Each test starts an in-process Axum server on an ephemeral port that
//! serves history pages as JSON and the live feed as `text/event-stream`,
//! then points a real driver at it and watches the published timeline.

#![allow(clippy::unwrap_used)]

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::stream::{self, StreamExt};
use serde_json::{Value, json};
use tideline_client::{FeedHandle, spawn_feed};
use tideline_core::FeedConfig;
use tideline_types::{FeedMode, FeedStatus, SubscriptionDescriptor, TimelineView};

const WAIT: Duration = Duration::from_secs(5);

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn config(base_url: String, max_attempts: Option<u32>) -> FeedConfig {
    let mut config = FeedConfig::default();
    config.source.base_url = base_url;
    config.reconnect.initial_delay_ms = 10;
    config.reconnect.max_delay_ms = 50;
    config.reconnect.jitter_ms = 0;
    config.reconnect.max_attempts = max_attempts;
    config.reconnect.seed = Some(7);
    config
}

fn raw(id: &str, time: &str, person: &str) -> Value {
    json!({ "type": "deploy", "time": time, "id": id, "person": person })
}

/// An SSE body that sends `frames` and then either ends or stays open.
fn sse(frames: Vec<String>, keep_open: bool) -> Response {
    let head = stream::iter(frames.into_iter().map(Ok::<_, Infallible>));
    let body = if keep_open {
        Body::from_stream(head.chain(stream::pending()))
    } else {
        Body::from_stream(head)
    };
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn data(value: &Value) -> String {
    format!("data: {value}\n\n")
}

async fn wait_for(handle: &FeedHandle, predicate: impl FnMut(&TimelineView) -> bool) -> TimelineView {
    let mut timeline = handle.timeline();
    let view = tokio::time::timeout(WAIT, timeline.wait_for(predicate))
        .await
        .unwrap()
        .unwrap();
    TimelineView::clone(&view)
}

fn ids(view: &TimelineView) -> Vec<&str> {
    view.events.iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test]
async fn history_and_live_merge_in_timestamp_order() {
    let router = Router::new()
        .route(
            "/api/streams/{id}/events",
            get(|| async {
                axum::Json(vec![
                    raw("h1", "2024-01-01T00:00:00Z", "alice"),
                    raw("h2", "2024-01-02T00:00:00Z", "anon-123"),
                    json!({ "type": "deploy", "id": "broken" }),
                ])
            }),
        )
        .route(
            "/api/streams/{id}/live",
            get(|| async {
                sse(
                    vec![
                        String::from(":keep-alive\n\n"),
                        String::from("data: definitely not json\n\n"),
                        data(&raw("l1", "2024-01-03T00:00:00Z", "bob")),
                    ],
                    true,
                )
            }),
        );
    let base = serve(router).await;
    let (handle, _driver) = spawn_feed(&config(base, Some(3))).unwrap();

    handle
        .subscribe(SubscriptionDescriptor::new("orders", FeedMode::JourneyAndStream))
        .await
        .unwrap();

    let view = wait_for(&handle, |v| v.status == FeedStatus::Active && v.events.len() == 3).await;
    assert_eq!(ids(&view), vec!["l1", "h2", "h1"]);
    let people: Vec<Option<&str>> = view.events.iter().map(|e| e.person.as_deref()).collect();
    assert_eq!(people, vec![Some("bob"), None, Some("alice")]);
}

#[tokio::test]
async fn journey_mode_keeps_the_whole_page() {
    let router = Router::new().route(
        "/api/streams/{id}/events",
        get(|| async {
            axum::Json(vec![
                raw("old", "2024-01-01T00:00:00Z", "alice"),
                raw("new", "2024-01-02T00:00:00Z", "alice"),
            ])
        }),
    );
    let base = serve(router).await;
    let mut config = config(base, Some(3));
    config.buffer.limit = std::num::NonZeroUsize::MIN;
    let (handle, _driver) = spawn_feed(&config).unwrap();

    handle
        .subscribe(SubscriptionDescriptor::new("orders", FeedMode::Journey))
        .await
        .unwrap();

    let view = wait_for(&handle, |v| v.status == FeedStatus::Active).await;
    assert_eq!(ids(&view), vec!["new", "old"]);
}

#[tokio::test]
async fn live_stream_reconnects_and_keeps_the_buffer() {
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let router = Router::new().route(
        "/api/streams/{id}/live",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    // First connection delivers one event and hangs up.
                    sse(vec![data(&raw("first", "2024-01-01T00:00:00Z", "a"))], false)
                } else {
                    sse(vec![data(&raw("second", "2024-01-02T00:00:00Z", "a"))], true)
                }
            }
        }),
    );
    let base = serve(router).await;
    let (handle, _driver) = spawn_feed(&config(base, Some(5))).unwrap();

    handle
        .subscribe(SubscriptionDescriptor::new("orders", FeedMode::Livestream))
        .await
        .unwrap();

    let view = wait_for(&handle, |v| v.events.len() == 2 && v.status == FeedStatus::Active).await;
    assert_eq!(ids(&view), vec!["second", "first"]);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn circuit_opens_after_the_attempt_budget() {
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let router = Router::new().route(
        "/api/streams/{id}/live",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance")
            }
        }),
    );
    let base = serve(router).await;
    let (handle, _driver) = spawn_feed(&config(base, Some(3))).unwrap();
    let descriptor = SubscriptionDescriptor::new("orders", FeedMode::Livestream);

    handle.subscribe(descriptor.clone()).await.unwrap();
    wait_for(&handle, |v| v.status == FeedStatus::CircuitOpen { attempts: 3 }).await;
    assert_eq!(connections.load(Ordering::SeqCst), 3);

    // Re-subscribing closes the circuit and spends a fresh budget.
    handle.subscribe(descriptor).await.unwrap();
    tokio::time::timeout(WAIT, async {
        while connections.load(Ordering::SeqCst) < 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    wait_for(&handle, |v| v.status == FeedStatus::CircuitOpen { attempts: 3 }).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn a_slow_page_for_the_old_stream_never_lands() {
    let router = Router::new().route(
        "/api/streams/{id}/events",
        get(|Path(id): Path<String>| async move {
            if id == "slow" {
                tokio::time::sleep(Duration::from_millis(300)).await;
                axum::Json(vec![raw("from-slow", "2024-06-01T00:00:00Z", "a")])
            } else {
                axum::Json(vec![raw("from-fast", "2024-01-01T00:00:00Z", "a")])
            }
        }),
    );
    let base = serve(router).await;
    let (handle, _driver) = spawn_feed(&config(base, Some(3))).unwrap();

    handle
        .subscribe(SubscriptionDescriptor::new("slow", FeedMode::Journey))
        .await
        .unwrap();
    handle
        .subscribe(SubscriptionDescriptor::new("fast", FeedMode::Journey))
        .await
        .unwrap();

    let view = wait_for(&handle, |v| v.status == FeedStatus::Active).await;
    assert_eq!(ids(&view), vec!["from-fast"]);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(ids(&handle.snapshot()), vec!["from-fast"]);
}

#[tokio::test]
async fn unsubscribe_returns_to_idle() {
    let router = Router::new().route(
        "/api/streams/{id}/live",
        get(|| async { sse(vec![data(&raw("x", "2024-01-01T00:00:00Z", "a"))], true) }),
    );
    let base = serve(router).await;
    let (handle, _driver) = spawn_feed(&config(base, None)).unwrap();

    handle
        .subscribe(SubscriptionDescriptor::new("orders", FeedMode::Livestream))
        .await
        .unwrap();
    wait_for(&handle, |v| v.events.len() == 1).await;

    handle.unsubscribe().await.unwrap();
    let view = wait_for(&handle, |v| v.status == FeedStatus::Idle).await;
    assert!(view.events.is_empty());
    assert!(view.descriptor.is_none());
}
