//! Network transport for the Tideline feed.
//!
//! The coordinator in `tideline-core` decides *what* should happen; this
//! crate makes it happen over HTTP:
//!
//! - **History**: one `GET` per subscription returning a JSON array of
//!   raw messages ([`HistoryClient`]).
//! - **Live**: a long-lived `text/event-stream` response whose `data`
//!   frames are raw messages ([`LiveClient`], [`SseDecoder`]).
//! - **Driver**: the task that owns the coordinator, spawns the above,
//!   schedules reconnects, and publishes [`TimelineView`] snapshots
//!   ([`FeedDriver`], [`FeedHandle`]).
//!
//! [`HistoryClient`]: history::HistoryClient
//! [`LiveClient`]: live::LiveClient
//! [`SseDecoder`]: sse::SseDecoder
//! [`FeedDriver`]: driver::FeedDriver
//! [`FeedHandle`]: driver::FeedHandle
//! [`TimelineView`]: tideline_types::TimelineView

pub mod driver;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod live;
pub mod sse;

pub use driver::{FeedDriver, FeedHandle, spawn_feed};
pub use endpoint::Endpoints;
pub use error::ClientError;
pub use history::HistoryClient;
pub use live::{LiveClient, LiveStream};
pub use sse::SseDecoder;
