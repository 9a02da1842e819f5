//! The async driver that carries out the coordinator's commands.
//!
//! One task owns the [`StreamCoordinator`] and therefore the buffer. It
//! waits on two channels: subscription requests from the rendering layer,
//! and results reported by the tasks it spawned (history fetches, the live
//! pump, reconnect timers). Every state change happens on this one task,
//! in arrival order. After each step the current [`TimelineView`] is
//! published on a `watch` channel if anything changed.
//!
//! ```text
//! FeedHandle --requests--> FeedDriver --commands--> spawned tasks
//!      ^                       |   ^                      |
//!      +------ watch ----------+   +------- results ------+
//! ```

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tideline_core::config::FeedConfig;
use tideline_core::{Command, ReconnectPolicy, StreamCoordinator, Ticket};
use tideline_types::{SubscriptionDescriptor, SubscriptionRequest, TimelineView};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::endpoint::Endpoints;
use crate::error::ClientError;
use crate::history::HistoryClient;
use crate::live::LiveClient;

/// Queued subscription requests before senders wait.
const CONTROL_CAPACITY: usize = 32;

/// Queued task results before the live pump waits on the driver.
const INBOX_CAPACITY: usize = 256;

/// A result reported back by a spawned task.
#[derive(Debug)]
enum DriverEvent {
    History {
        ticket: Ticket,
        result: Result<Vec<serde_json::Value>, ClientError>,
    },
    LiveOpened {
        ticket: Ticket,
    },
    LiveMessage {
        ticket: Ticket,
        text: String,
    },
    LiveFailed {
        ticket: Ticket,
        error: ClientError,
    },
    ReconnectDue {
        ticket: Ticket,
    },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable access to a running driver.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    control: mpsc::Sender<SubscriptionRequest>,
    timeline: watch::Receiver<TimelineView>,
}

impl FeedHandle {
    /// Forward a subscription request to the driver.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DriverStopped`] if the driver has exited.
    pub async fn request(&self, request: SubscriptionRequest) -> Result<(), ClientError> {
        self.control
            .send(request)
            .await
            .map_err(|_| ClientError::DriverStopped)
    }

    /// Show `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DriverStopped`] if the driver has exited.
    pub async fn subscribe(&self, descriptor: SubscriptionDescriptor) -> Result<(), ClientError> {
        self.request(SubscriptionRequest::Subscribe { descriptor }).await
    }

    /// Tear the feed down.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DriverStopped`] if the driver has exited.
    pub async fn unsubscribe(&self) -> Result<(), ClientError> {
        self.request(SubscriptionRequest::Unsubscribe).await
    }

    /// A sender for subscription requests, for components that only need
    /// to steer the feed.
    pub fn control(&self) -> mpsc::Sender<SubscriptionRequest> {
        self.control.clone()
    }

    /// A receiver that observes every published [`TimelineView`].
    pub fn timeline(&self) -> watch::Receiver<TimelineView> {
        self.timeline.clone()
    }

    /// The most recently published view.
    pub fn snapshot(&self) -> TimelineView {
        self.timeline.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Owns the coordinator and executes its commands.
#[derive(Debug)]
pub struct FeedDriver {
    coordinator: StreamCoordinator,
    history: HistoryClient,
    live: LiveClient,
    control: mpsc::Receiver<SubscriptionRequest>,
    inbox: mpsc::Receiver<DriverEvent>,
    outbox: mpsc::Sender<DriverEvent>,
    history_task: Option<JoinHandle<()>>,
    live_task: Option<(Ticket, JoinHandle<()>)>,
    reconnect_task: Option<JoinHandle<()>>,
    timeline: watch::Sender<TimelineView>,
    published: u64,
}

impl FeedDriver {
    /// Build a driver and its handle from configuration.
    ///
    /// The driver does nothing until [`FeedDriver::run`] is polled and a
    /// subscription request arrives.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for an unusable base URL and
    /// [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &FeedConfig) -> Result<(Self, FeedHandle), ClientError> {
        let endpoints = Endpoints::new(&config.source.base_url, config.source.default_page_size)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("tideline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Http(format!("failed to build HTTP client: {e}")))?;

        let rng = config
            .reconnect
            .seed
            .map_or_else(SmallRng::from_os_rng, SmallRng::seed_from_u64);
        let coordinator = StreamCoordinator::new(
            config.buffer.limit,
            ReconnectPolicy::from(&config.reconnect),
            rng,
        );

        info!(
            base_url = %endpoints.base(),
            limit = config.buffer.limit.get(),
            max_attempts = ?config.reconnect.max_attempts,
            "feed driver configured"
        );

        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (outbox, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (timeline_tx, timeline_rx) = watch::channel(coordinator.view());
        let published = coordinator.revision();

        let driver = Self {
            coordinator,
            history: HistoryClient::new(client.clone(), endpoints.clone()),
            live: LiveClient::new(client, endpoints),
            control: control_rx,
            inbox,
            outbox,
            history_task: None,
            live_task: None,
            reconnect_task: None,
            timeline: timeline_tx,
            published,
        };
        let handle = FeedHandle {
            control: control_tx,
            timeline: timeline_rx,
        };
        Ok((driver, handle))
    }

    /// Run until every [`FeedHandle`] and control sender is dropped.
    pub async fn run(mut self) {
        info!("feed driver started");
        loop {
            tokio::select! {
                request = self.control.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    self.handle_request(request);
                }
                Some(event) = self.inbox.recv() => self.handle_event(event),
            }
            self.publish();
        }
        self.shutdown();
        info!("feed driver stopped");
    }

    fn handle_request(&mut self, request: SubscriptionRequest) {
        let commands = match request {
            SubscriptionRequest::Subscribe { descriptor } => self.coordinator.subscribe(descriptor),
            SubscriptionRequest::Unsubscribe => self.coordinator.unsubscribe(),
        };
        self.execute(commands);
    }

    fn handle_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::History { ticket, result } => {
                self.coordinator.on_history(ticket, result);
            }
            DriverEvent::LiveOpened { ticket } => {
                self.coordinator.on_live_opened(ticket);
            }
            DriverEvent::LiveMessage { ticket, text } => {
                self.coordinator.on_live_message(ticket, &text);
            }
            DriverEvent::LiveFailed { ticket, error } => {
                let commands = self.coordinator.on_live_error(ticket, error);
                self.execute(commands);
            }
            DriverEvent::ReconnectDue { ticket } => {
                let commands = self.coordinator.on_reconnect_due(ticket);
                self.execute(commands);
            }
        }
    }

    fn execute(&mut self, commands: Vec<Command>) {
        for command in commands {
            debug!(?command, "executing");
            match command {
                Command::FetchHistory { ticket, descriptor } => {
                    if let Some(task) = self.history_task.take() {
                        task.abort();
                    }
                    let client = self.history.clone();
                    let outbox = self.outbox.clone();
                    self.history_task = Some(tokio::spawn(async move {
                        let result = client.fetch(&descriptor).await;
                        let _ = outbox.send(DriverEvent::History { ticket, result }).await;
                    }));
                }
                Command::OpenLive { ticket, descriptor } => {
                    self.abort_live();
                    let task = tokio::spawn(pump_live(
                        self.live.clone(),
                        descriptor,
                        ticket,
                        self.outbox.clone(),
                    ));
                    self.live_task = Some((ticket, task));
                }
                Command::CloseLive { ticket } => {
                    if self.live_task.as_ref().is_some_and(|(open, _)| *open == ticket) {
                        self.abort_live();
                    }
                }
                Command::ScheduleReconnect { ticket, delay } => {
                    if let Some(task) = self.reconnect_task.take() {
                        task.abort();
                    }
                    self.reconnect_task = Some(spawn_timer(ticket, delay, self.outbox.clone()));
                }
            }
        }
    }

    fn abort_live(&mut self) {
        if let Some((_, task)) = self.live_task.take() {
            task.abort();
        }
    }

    fn publish(&mut self) {
        let revision = self.coordinator.revision();
        if revision != self.published {
            self.published = revision;
            self.timeline.send_replace(self.coordinator.view());
        }
    }

    fn shutdown(&mut self) {
        self.abort_live();
        for task in [self.history_task.take(), self.reconnect_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

/// Build a driver from `config` and spawn it on the current runtime.
///
/// # Errors
///
/// Returns the same errors as [`FeedDriver::new`].
pub fn spawn_feed(config: &FeedConfig) -> Result<(FeedHandle, JoinHandle<()>), ClientError> {
    let (driver, handle) = FeedDriver::new(config)?;
    Ok((handle, tokio::spawn(driver.run())))
}

/// Open the live stream and forward everything it yields until it fails
/// or the driver stops listening.
async fn pump_live(
    client: LiveClient,
    descriptor: SubscriptionDescriptor,
    ticket: Ticket,
    outbox: mpsc::Sender<DriverEvent>,
) {
    let mut stream = match client.open(&descriptor).await {
        Ok(stream) => stream,
        Err(error) => {
            let _ = outbox.send(DriverEvent::LiveFailed { ticket, error }).await;
            return;
        }
    };
    if outbox.send(DriverEvent::LiveOpened { ticket }).await.is_err() {
        return;
    }
    loop {
        match stream.next_message().await {
            Ok(text) => {
                if outbox
                    .send(DriverEvent::LiveMessage { ticket, text })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(error) => {
                let _ = outbox.send(DriverEvent::LiveFailed { ticket, error }).await;
                return;
            }
        }
    }
}

fn spawn_timer(ticket: Ticket, delay: Duration, outbox: mpsc::Sender<DriverEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = outbox.send(DriverEvent::ReconnectDue { ticket }).await;
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tideline_types::{FeedMode, FeedStatus};

    use super::*;

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = FeedConfig::default();
        config.source.base_url = String::from("::nope::");
        assert!(matches!(
            FeedDriver::new(&config),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn new_driver_publishes_an_idle_view() {
        let (_driver, handle) = FeedDriver::new(&FeedConfig::default()).unwrap();
        let view = handle.snapshot();
        assert_eq!(view.status, FeedStatus::Idle);
        assert!(view.events.is_empty());
        assert!(view.descriptor.is_none());
    }

    #[tokio::test]
    async fn requests_fail_once_the_driver_is_gone() {
        let (driver, handle) = FeedDriver::new(&FeedConfig::default()).unwrap();
        drop(driver);
        let result = handle
            .subscribe(SubscriptionDescriptor::new("a", FeedMode::Journey))
            .await;
        assert!(matches!(result, Err(ClientError::DriverStopped)));
    }

    #[tokio::test]
    async fn run_returns_when_all_handles_drop() {
        let (driver, handle) = FeedDriver::new(&FeedConfig::default()).unwrap();
        let task = tokio::spawn(driver.run());
        drop(handle);
        task.await.unwrap();
    }
}
