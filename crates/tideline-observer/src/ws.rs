//! `WebSocket` handler for live timeline updates.
//!
//! Clients connect to `GET /ws/timeline`. They first receive the current
//! [`TimelineView`](tideline_types::TimelineView) as JSON, then one more
//! each time the driver publishes a change. A client that falls behind
//! skips the views it missed and resumes from the newest, which is
//! harmless since every view is a full snapshot.

use core::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tideline_types::TimelineView;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming timeline views.
///
/// # Route
///
/// `GET /ws/timeline`
pub async fn ws_timeline(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (sink, stream) = socket.split();
    stream_views(sink, stream, state).await;
}

/// Pump views into `sink` until the client leaves or the broadcast
/// channel closes. Pings read from `stream` are answered with pongs.
async fn stream_views<Si, St, E>(mut sink: Si, mut stream: St, state: Arc<AppState>)
where
    Si: Sink<Message> + Unpin,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    debug!("WebSocket client connected");

    // Subscribe before reading the snapshot so nothing published in
    // between is lost.
    let mut rx = state.subscribe();
    let current = state.timeline.read().await.clone();
    if !send_view(&mut sink, &current).await {
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(view) => {
                        if !send_view(&mut sink, &view).await {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Send one view as a text frame. Returns `false` once the client is gone.
async fn send_view<Si>(sink: &mut Si, view: &TimelineView) -> bool
where
    Si: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(view) {
        Ok(j) => j,
        Err(e) => {
            warn!("failed to serialize timeline view: {e}");
            return true;
        }
    };
    if sink.send(Message::Text(json.into())).await.is_err() {
        debug!("WebSocket client disconnected (send failed)");
        return false;
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use axum::body::Bytes;
    use chrono::{TimeZone, Utc};
    use futures::channel::mpsc;
    use tideline_types::{Event, FeedMode, FeedStatus, SubscriptionDescriptor};

    use super::*;

    type Inbound = Result<Message, axum::Error>;

    fn view(status: FeedStatus, ids: &[&str]) -> TimelineView {
        TimelineView {
            descriptor: Some(SubscriptionDescriptor::new("orders", FeedMode::Livestream)),
            status,
            events: ids
                .iter()
                .map(|id| Event {
                    id: (*id).to_owned(),
                    title: String::from("order.created"),
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
                    person: None,
                    data: None,
                })
                .collect(),
        }
    }

    async fn next_view(out: &mut mpsc::UnboundedReceiver<Message>) -> TimelineView {
        match out.next().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn current_view_first_then_published_views() {
        let state = Arc::new(AppState::new());
        let first = view(FeedStatus::Active, &["e1"]);
        state.publish(first.clone()).await;

        let (out_tx, mut out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Inbound>();
        let task = tokio::spawn(stream_views(out_tx, in_rx, Arc::clone(&state)));

        assert_eq!(next_view(&mut out_rx).await, first);

        let second = view(FeedStatus::Subscribing, &["e2", "e1"]);
        state.publish(second.clone()).await;
        assert_eq!(next_view(&mut out_rx).await, second);

        in_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn pings_are_answered() {
        let state = Arc::new(AppState::new());
        let (out_tx, mut out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Inbound>();
        let task = tokio::spawn(stream_views(out_tx, in_rx, state));

        assert_eq!(next_view(&mut out_rx).await, TimelineView::default());

        in_tx
            .unbounded_send(Ok(Message::Ping(Bytes::from_static(b"hi"))))
            .unwrap();
        match out_rx.next().await {
            Some(Message::Pong(data)) => assert_eq!(data, Bytes::from_static(b"hi")),
            other => panic!("expected a pong, got {other:?}"),
        }

        drop(in_tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn departed_client_ends_the_loop_on_next_publish() {
        let state = Arc::new(AppState::new());
        let (out_tx, mut out_rx) = mpsc::unbounded::<Message>();
        let (_in_tx, in_rx) = mpsc::unbounded::<Inbound>();
        let task = tokio::spawn(stream_views(out_tx, in_rx, Arc::clone(&state)));

        next_view(&mut out_rx).await;
        drop(out_rx);
        state.publish(view(FeedStatus::Active, &["e1"])).await;
        task.await.unwrap();
    }
}
