//! Orderly shutdown of the feed driver.
//!
//! The driver leaves its run loop once every control sender is gone and
//! then closes the live stream and cancels pending fetches and timers.
//! Senders held elsewhere (the observer state, open `WebSocket`
//! connections) can keep it alive, so the wait is bounded.

use std::time::Duration;

use tideline_client::FeedHandle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long to wait for the driver before aborting it.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Unsubscribe, release `feed` and wait up to `grace` for the driver
/// task to finish. A driver still running after `grace` is aborted.
///
/// Returns whether the driver stopped on its own.
pub async fn stop_feed(feed: FeedHandle, mut driver_task: JoinHandle<()>, grace: Duration) -> bool {
    if let Err(e) = feed.unsubscribe().await {
        warn!(error = %e, "feed driver already stopped");
    }
    drop(feed);

    match tokio::time::timeout(grace, &mut driver_task).await {
        Ok(Ok(())) => {
            info!("feed driver stopped cleanly");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "feed driver task failed");
            false
        }
        Err(_) => {
            let grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
            warn!(grace_ms, "feed driver still running, aborting");
            driver_task.abort();
            false
        }
    }
}
