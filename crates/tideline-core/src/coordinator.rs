//! The stream coordinator: subscription lifecycle as a sans-IO state machine.
//!
//! The coordinator owns the [`EventBuffer`] and decides what network work
//! should happen, but never performs it. Every input returns the
//! [`Command`]s the driver must execute, and every command carries a
//! [`Ticket`]. Results are fed back with the ticket they were issued under;
//! anything that does not match the currently outstanding ticket is stale
//! and discarded. This is what keeps a slow history response for stream
//! `A` out of the buffer after the widget has switched to stream `B`.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --subscribe--> Subscribing --sources up--> Active
//!                          ^                        |
//!                          |                   live error
//!                    reconnect due                  v
//!                          +------------------ Reconnecting --budget spent--> CircuitOpen
//! ```
//!
//! `unsubscribe` returns to `Idle` from anywhere. Only a descriptor change
//! (or unsubscribe) clears the buffer; reconnects keep it.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tideline_types::{FeedStatus, SubscriptionDescriptor, TimelineView};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::buffer::{EventBuffer, Eviction};
use crate::normalize::{normalize, parse_push_payload};

// ---------------------------------------------------------------------------
// Tickets and commands
// ---------------------------------------------------------------------------

/// Identifies one outstanding operation within one subscription generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
    sequence: u64,
}

impl Ticket {
    /// Descriptor generation the operation was issued under.
    pub const fn generation(self) -> u64 {
        self.generation
    }

    /// Per-coordinator operation counter.
    pub const fn sequence(self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.generation, self.sequence)
    }
}

/// Network work requested by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch one historical page and report it via
    /// [`StreamCoordinator::on_history`].
    FetchHistory {
        /// Ticket to report the result under.
        ticket: Ticket,
        /// Feed to fetch.
        descriptor: SubscriptionDescriptor,
    },
    /// Open a live subscription and report through
    /// [`StreamCoordinator::on_live_opened`],
    /// [`StreamCoordinator::on_live_message`] and
    /// [`StreamCoordinator::on_live_error`].
    OpenLive {
        /// Ticket identifying the new handle.
        ticket: Ticket,
        /// Feed to subscribe to.
        descriptor: SubscriptionDescriptor,
    },
    /// Close the live handle opened under `ticket`. Always issued before
    /// any `OpenLive` that replaces it.
    CloseLive {
        /// Ticket of the handle to close.
        ticket: Ticket,
    },
    /// Call [`StreamCoordinator::on_reconnect_due`] after `delay`.
    ScheduleReconnect {
        /// Ticket to report under.
        ticket: Ticket,
        /// How long to wait.
        delay: Duration,
    },
}

impl Command {
    /// The ticket the command was issued under.
    pub const fn ticket(&self) -> Ticket {
        match self {
            Self::FetchHistory { ticket, .. }
            | Self::OpenLive { ticket, .. }
            | Self::CloseLive { ticket }
            | Self::ScheduleReconnect { ticket, .. } => *ticket,
        }
    }
}

/// What happened to a delivered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The result belonged to the current subscription and was ingested.
    Applied(IngestReport),
    /// The result was issued under a superseded ticket and was discarded.
    Stale,
}

/// Per-delivery ingestion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Events inserted into the buffer.
    pub inserted: usize,
    /// Messages that were JSON but failed normalization.
    pub dropped: usize,
    /// Push frames that were not JSON at all.
    pub ignored: usize,
    /// Events evicted from the tail to respect the limit.
    pub evicted: usize,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns the buffer and the subscription lifecycle.
#[derive(Debug)]
pub struct StreamCoordinator {
    status: FeedStatus,
    descriptor: Option<SubscriptionDescriptor>,
    buffer: EventBuffer,
    policy: ReconnectPolicy,
    rng: SmallRng,
    generation: u64,
    sequence: u64,
    history: Option<Ticket>,
    live: Option<Ticket>,
    live_connected: bool,
    reconnect: Option<Ticket>,
    attempts: u32,
    revision: u64,
}

impl StreamCoordinator {
    /// Create an idle coordinator.
    pub fn new(limit: NonZeroUsize, policy: ReconnectPolicy, rng: SmallRng) -> Self {
        Self {
            status: FeedStatus::Idle,
            descriptor: None,
            buffer: EventBuffer::new(limit),
            policy,
            rng,
            generation: 0,
            sequence: 0,
            history: None,
            live: None,
            live_connected: false,
            reconnect: None,
            attempts: 0,
            revision: 0,
        }
    }

    /// Create an idle coordinator whose jitter is reproducible from `seed`.
    pub fn with_seed(limit: NonZeroUsize, policy: ReconnectPolicy, seed: u64) -> Self {
        Self::new(limit, policy, SmallRng::seed_from_u64(seed))
    }

    /// Current lifecycle state.
    pub const fn status(&self) -> FeedStatus {
        self.status
    }

    /// The feed currently shown, if any.
    pub const fn descriptor(&self) -> Option<&SubscriptionDescriptor> {
        self.descriptor.as_ref()
    }

    /// The ordered buffer.
    pub const fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Counter bumped on every observable change to status or buffer.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot for the rendering layer.
    pub fn view(&self) -> TimelineView {
        TimelineView {
            descriptor: self.descriptor.clone(),
            status: self.status,
            events: self.buffer.to_vec(),
        }
    }

    /// Show `descriptor`.
    ///
    /// An unchanged descriptor is a no-op while the feed is subscribing,
    /// active, or waiting to reconnect. With the circuit open it resets the
    /// reconnect budget and reopens the live stream, keeping the buffer.
    /// Any other call starts a fresh cycle: the old live handle is closed,
    /// the buffer is cleared, and the sources for the new mode are
    /// requested.
    pub fn subscribe(&mut self, descriptor: SubscriptionDescriptor) -> Vec<Command> {
        if self.descriptor.as_ref() == Some(&descriptor) {
            match self.status {
                FeedStatus::Subscribing | FeedStatus::Active | FeedStatus::Reconnecting { .. } => {
                    debug!(
                        stream_id = %descriptor.stream_id,
                        status = self.status.label(),
                        "descriptor unchanged, ignoring subscribe"
                    );
                    return Vec::new();
                }
                FeedStatus::CircuitOpen { attempts } => {
                    info!(
                        stream_id = %descriptor.stream_id,
                        attempts, "resubscribe requested, closing circuit"
                    );
                    self.attempts = 0;
                    self.status = FeedStatus::Subscribing;
                    self.touch();
                    return vec![self.open_live(descriptor)];
                }
                FeedStatus::Idle => {}
            }
        }

        let mut commands = self.teardown();
        self.generation = self.generation.wrapping_add(1);
        self.buffer.clear();
        self.attempts = 0;
        self.status = FeedStatus::Subscribing;

        info!(
            stream_id = %descriptor.stream_id,
            filter = descriptor.filter.as_deref().unwrap_or(""),
            mode = %descriptor.mode,
            generation = self.generation,
            "subscribing"
        );

        if descriptor.mode.includes_history() {
            let ticket = self.next_ticket();
            self.history = Some(ticket);
            commands.push(Command::FetchHistory {
                ticket,
                descriptor: descriptor.clone(),
            });
        }
        if descriptor.mode.includes_live() {
            commands.push(self.open_live(descriptor.clone()));
        }

        self.descriptor = Some(descriptor);
        self.touch();
        commands
    }

    /// Tear the feed down: close the live handle, invalidate everything
    /// outstanding, clear the buffer, and return to `Idle`.
    pub fn unsubscribe(&mut self) -> Vec<Command> {
        if self.descriptor.is_none() && self.status == FeedStatus::Idle {
            return Vec::new();
        }
        let commands = self.teardown();
        self.generation = self.generation.wrapping_add(1);
        self.descriptor = None;
        self.buffer.clear();
        self.attempts = 0;
        self.status = FeedStatus::Idle;
        info!(generation = self.generation, "unsubscribed");
        self.touch();
        commands
    }

    /// Deliver the outcome of a [`Command::FetchHistory`].
    ///
    /// Items are normalized and inserted in the order received; items that
    /// fail normalization are dropped individually. A failed fetch
    /// completes the historical leg without inserting anything.
    pub fn on_history<E: fmt::Display>(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<serde_json::Value>, E>,
    ) -> Delivery {
        if self.history != Some(ticket) {
            debug!(%ticket, "discarding stale history response");
            return Delivery::Stale;
        }
        self.history = None;

        let mut report = IngestReport::default();
        match result {
            Ok(items) => {
                for item in &items {
                    match normalize(item) {
                        Ok(event) => {
                            let evicted = self.buffer.insert_ordered(event, Eviction::Unbounded);
                            report.evicted = report.evicted.saturating_add(evicted);
                            report.inserted = report.inserted.saturating_add(1);
                        }
                        Err(e) => {
                            debug!(%ticket, error = %e, "dropping history item");
                            report.dropped = report.dropped.saturating_add(1);
                        }
                    }
                }
                info!(
                    %ticket,
                    inserted = report.inserted,
                    dropped = report.dropped,
                    buffered = self.buffer.len(),
                    "history applied"
                );
            }
            Err(e) => {
                warn!(%ticket, error = %e, "history fetch failed");
            }
        }

        self.maybe_activate();
        self.touch();
        Delivery::Applied(report)
    }

    /// The live handle opened under `ticket` is connected.
    ///
    /// Returns `false` if the ticket is stale.
    pub fn on_live_opened(&mut self, ticket: Ticket) -> bool {
        if self.live != Some(ticket) {
            debug!(%ticket, "ignoring open from a closed live handle");
            return false;
        }
        self.live_connected = true;
        if self.attempts > 0 {
            info!(%ticket, attempts = self.attempts, "live stream reconnected");
        }
        self.attempts = 0;
        self.maybe_activate();
        self.touch();
        true
    }

    /// Deliver one push frame from the live handle opened under `ticket`.
    ///
    /// Non-JSON frames are ignored and frames that fail normalization are
    /// dropped; neither is an error. Accepted events are inserted with the
    /// capacity bound enforced.
    pub fn on_live_message(&mut self, ticket: Ticket, text: &str) -> Delivery {
        if self.live != Some(ticket) {
            debug!(%ticket, "discarding message from a closed live handle");
            return Delivery::Stale;
        }

        let mut report = IngestReport::default();
        let value = match parse_push_payload(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(%ticket, error = %e, "ignoring non-JSON push frame");
                report.ignored = 1;
                return Delivery::Applied(report);
            }
        };

        match normalize(&value) {
            Ok(event) => {
                report.evicted = self.buffer.insert_ordered(event, Eviction::Bounded);
                report.inserted = 1;
                self.touch();
            }
            Err(e) => {
                debug!(%ticket, error = %e, "dropping push message");
                report.dropped = 1;
            }
        }
        Delivery::Applied(report)
    }

    /// The live handle opened under `ticket` failed or ended.
    ///
    /// Closes the handle and either schedules a reconnect with backoff or,
    /// once the attempt budget is spent, opens the circuit. The buffer is
    /// kept either way.
    pub fn on_live_error<E: fmt::Display>(&mut self, ticket: Ticket, error: E) -> Vec<Command> {
        if self.live != Some(ticket) {
            debug!(%ticket, error = %error, "ignoring error from a closed live handle");
            return Vec::new();
        }
        self.live = None;
        self.live_connected = false;
        self.attempts = self.attempts.saturating_add(1);
        let mut commands = vec![Command::CloseLive { ticket }];

        if self.policy.is_exhausted(self.attempts) {
            warn!(
                %ticket,
                error = %error,
                attempts = self.attempts,
                "live stream failed, reconnect budget exhausted"
            );
            self.status = FeedStatus::CircuitOpen {
                attempts: self.attempts,
            };
            self.touch();
            return commands;
        }

        let delay = self.policy.delay_for(self.attempts, &mut self.rng);
        let retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let reconnect = self.next_ticket();
        self.reconnect = Some(reconnect);
        self.status = FeedStatus::Reconnecting {
            attempt: self.attempts,
            retry_in_ms,
        };
        warn!(
            %ticket,
            error = %error,
            attempt = self.attempts,
            retry_in_ms,
            "live stream failed, scheduling reconnect"
        );
        commands.push(Command::ScheduleReconnect {
            ticket: reconnect,
            delay,
        });
        self.touch();
        commands
    }

    /// A [`Command::ScheduleReconnect`] timer fired.
    pub fn on_reconnect_due(&mut self, ticket: Ticket) -> Vec<Command> {
        if self.reconnect != Some(ticket) {
            debug!(%ticket, "ignoring superseded reconnect timer");
            return Vec::new();
        }
        self.reconnect = None;
        let Some(descriptor) = self.descriptor.clone() else {
            return Vec::new();
        };
        debug!(%ticket, attempt = self.attempts, "reopening live stream");
        self.status = FeedStatus::Subscribing;
        self.touch();
        vec![self.open_live(descriptor)]
    }

    fn open_live(&mut self, descriptor: SubscriptionDescriptor) -> Command {
        let ticket = self.next_ticket();
        self.live = Some(ticket);
        self.live_connected = false;
        Command::OpenLive { ticket, descriptor }
    }

    fn teardown(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if let Some(ticket) = self.live.take() {
            commands.push(Command::CloseLive { ticket });
        }
        self.live_connected = false;
        self.history = None;
        self.reconnect = None;
        commands
    }

    fn maybe_activate(&mut self) {
        let Some(descriptor) = &self.descriptor else {
            return;
        };
        let live_ready = !descriptor.mode.includes_live() || self.live_connected;
        if self.status == FeedStatus::Subscribing && self.history.is_none() && live_ready {
            self.status = FeedStatus::Active;
            info!(
                stream_id = %descriptor.stream_id,
                buffered = self.buffer.len(),
                "feed active"
            );
        }
    }

    const fn next_ticket(&mut self) -> Ticket {
        self.sequence = self.sequence.wrapping_add(1);
        Ticket {
            generation: self.generation,
            sequence: self.sequence,
        }
    }

    const fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
