//! Rendering API server for the Tideline timeline feed.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/timeline`) pushing every new
//!   [`TimelineView`](tideline_types::TimelineView) via
//!   [`tokio::sync::broadcast`]
//! - **REST endpoints** for the buffered events, the day-grouped
//!   projection and the feed status
//! - **Control endpoints** (`PUT`/`DELETE /api/subscription`) forwarding
//!   subscription changes to the feed driver
//! - **Minimal HTML timeline** (`GET /`)
//!
//! The server only reads the last published view; it never blocks the
//! feed driver.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod style;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind};
pub use startup::{StartupError, spawn_observer};
pub use state::AppState;
pub use style::CategoryStyles;
