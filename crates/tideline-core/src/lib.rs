//! Feed engine for the Tideline timeline.
//!
//! This crate holds everything about the feed that does not touch the
//! network: turning raw messages into events, keeping them ordered and
//! bounded, and deciding when to fetch history, open or close the live
//! stream, and back off after failures. The async transport that carries
//! out those decisions lives in `tideline-client`.
//!
//! # Modules
//!
//! - [`backoff`] -- Exponential reconnect delay with jitter and a budget.
//! - [`buffer`] -- Newest-first event buffer with sliding-window eviction.
//! - [`config`] -- Configuration loading from `tideline.yaml` plus
//!   environment overrides.
//! - [`coordinator`] -- [`StreamCoordinator`], the sans-IO subscription
//!   lifecycle.
//! - [`error`] -- [`ParseError`] for messages that cannot be normalized.
//! - [`grouping`] -- Today / Yesterday / date grouping for rendering.
//! - [`normalize`] -- Raw message to [`Event`](tideline_types::Event).
//!
//! [`StreamCoordinator`]: coordinator::StreamCoordinator
//! [`ParseError`]: error::ParseError

pub mod backoff;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod grouping;
pub mod normalize;

pub use backoff::ReconnectPolicy;
pub use buffer::{EventBuffer, Eviction, DEFAULT_LIMIT};
pub use config::{ConfigError, FeedConfig};
pub use coordinator::{Command, Delivery, IngestReport, StreamCoordinator, Ticket};
pub use error::ParseError;
pub use grouping::{day_bucket, group_by_relative_day};
pub use normalize::{is_anonymous, normalize, normalize_message, parse_push_payload};
