//! Shared application state for the rendering API server.
//!
//! [`AppState`] holds the latest [`TimelineView`] published by the feed
//! driver, a broadcast channel that fans each new view out to `WebSocket`
//! clients, the category style cache, and (when attached) the control
//! channel used to steer the feed.

use std::sync::Arc;

use tideline_types::{SubscriptionRequest, TimelineView};
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};

use crate::style::CategoryStyles;

/// Capacity of the broadcast channel for timeline views.
///
/// A subscriber that falls behind by more than this many views receives a
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest one.
const BROADCAST_CAPACITY: usize = 256;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for timeline views.
    pub tx: broadcast::Sender<TimelineView>,
    /// The most recently published view.
    pub timeline: Arc<RwLock<TimelineView>>,
    /// Category style cache shared by every request.
    pub styles: Arc<Mutex<CategoryStyles>>,
    /// Subscription requests to the feed driver, when one is attached.
    pub control: Option<mpsc::Sender<SubscriptionRequest>>,
}

impl AppState {
    /// Create a state with an idle view, default styles and no driver.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            timeline: Arc::new(RwLock::new(TimelineView::default())),
            styles: Arc::new(Mutex::new(CategoryStyles::default())),
            control: None,
        }
    }

    /// Attach the feed driver's control channel.
    #[must_use]
    pub fn with_control(mut self, control: mpsc::Sender<SubscriptionRequest>) -> Self {
        self.control = Some(control);
        self
    }

    /// Replace the style cache.
    #[must_use]
    pub fn with_styles(mut self, styles: CategoryStyles) -> Self {
        self.styles = Arc::new(Mutex::new(styles));
        self
    }

    /// Subscribe to the timeline broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineView> {
        self.tx.subscribe()
    }

    /// Store `view` as the current timeline and push it to all connected
    /// clients.
    ///
    /// Returns the number of receivers that got the view. Zero is normal
    /// when no `WebSocket` clients are connected.
    pub async fn publish(&self, view: TimelineView) -> usize {
        *self.timeline.write().await = view.clone();
        self.tx.send(view).unwrap_or(0)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
