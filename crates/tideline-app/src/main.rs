//! `tideline`: a live timeline feed with a rendering API.
//!
//! Wires the feed driver (history + live stream, ordered buffer, backoff)
//! to the observer server that renders it.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `$TIDELINE_CONFIG` (default `tideline.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the feed driver
//! 4. Start the observer server and the bridge that feeds it
//! 5. Subscribe to the configured stream, if any
//! 6. Run until `Ctrl-C`

mod error;
mod publish;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use tideline_client::spawn_feed;
use tideline_core::FeedConfig;
use tideline_core::config::LoggingConfig;
use tideline_observer::{AppState, CategoryStyles, ServerConfig, spawn_observer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "tideline.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a subsystem fails to
/// start.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("TIDELINE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = FeedConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        base_url = config.source.base_url,
        stream_id = config.source.stream_id.as_deref().unwrap_or("(none)"),
        mode = %config.source.mode,
        limit = config.buffer.limit.get(),
        "tideline starting"
    );

    run(config).await.context("tideline stopped with an error")?;

    info!("tideline shutdown complete");
    Ok(())
}

/// Start every subsystem and wait for `Ctrl-C`.
async fn run(config: FeedConfig) -> Result<(), AppError> {
    let (feed, driver_task) = spawn_feed(&config)?;

    let mut background = Vec::new();
    if config.observer.enabled {
        let styles = CategoryStyles::new(config.observer.styles.clone(), config.observer.style_seed);
        let state = Arc::new(
            AppState::new()
                .with_control(feed.control())
                .with_styles(styles),
        );
        let server = spawn_observer(&ServerConfig::from(&config.observer), Arc::clone(&state)).await?;
        background.push(server);
        background.push(publish::spawn_bridge(feed.timeline(), state));
        info!(
            host = config.observer.host,
            port = config.observer.port,
            "observer server started"
        );
    } else {
        info!("observer server disabled");
    }

    if let Some(descriptor) = config.descriptor() {
        feed.subscribe(descriptor).await?;
    } else {
        info!("no stream configured, waiting for PUT /api/subscription");
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|source| AppError::Signal { source })?;
    info!("shutdown requested");

    for task in background {
        task.abort();
    }
    shutdown::stop_feed(feed, driver_task, shutdown::SHUTDOWN_GRACE).await;
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
