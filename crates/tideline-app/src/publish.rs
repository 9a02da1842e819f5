//! Bridge from the feed driver's `watch` channel to the rendering API.
//!
//! The driver publishes a [`TimelineView`] whenever its state changes. This
//! task copies each one into the observer's [`AppState`] and broadcasts it
//! to `WebSocket` clients. Intermediate views may be coalesced; every view
//! is a full snapshot, so only the latest matters.

use std::sync::Arc;

use tideline_observer::AppState;
use tideline_types::TimelineView;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Forward every view from `timeline` into `state` until the driver exits.
pub fn spawn_bridge(
    mut timeline: watch::Receiver<TimelineView>,
    state: Arc<AppState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let view = timeline.borrow_and_update().clone();
            let status = view.status.label();
            let buffered = view.events.len();
            let receivers = state.publish(view).await;
            debug!(status, buffered, receivers, "timeline published");

            if timeline.changed().await.is_err() {
                debug!("feed driver gone, stopping bridge");
                return;
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tideline_types::{FeedMode, FeedStatus, SubscriptionDescriptor};

    use super::*;

    #[tokio::test]
    async fn views_reach_the_observer_state() {
        let (tx, rx) = watch::channel(TimelineView::default());
        let state = Arc::new(AppState::new());
        let mut broadcasts = state.subscribe();
        let bridge = spawn_bridge(rx, Arc::clone(&state));

        let view = TimelineView {
            descriptor: Some(SubscriptionDescriptor::new("orders", FeedMode::Journey)),
            status: FeedStatus::Active,
            events: Vec::new(),
        };
        tx.send_replace(view.clone());

        let received = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let next = broadcasts.recv().await.unwrap();
                if next == view {
                    return next;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(received.status, FeedStatus::Active);
        assert_eq!(*state.timeline.read().await, view);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), bridge)
            .await
            .unwrap()
            .unwrap();
    }
}
